//! Linked identity records, per-affiliate locks, and permission links.

pub mod link;
pub mod lock;
pub mod service;

pub use link::{LinkClaims, LinkSigner};
pub use lock::KeyedLocks;
pub use service::LinkageService;
