//! Linked identity domain entities.

pub mod model;

pub use model::{LinkedIdentityRecord, RegistryToken};
