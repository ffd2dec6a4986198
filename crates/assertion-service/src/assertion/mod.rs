//! Assertion lifecycle service.

pub mod service;

pub use service::{AssertionService, PermissionLink};
