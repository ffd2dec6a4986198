//! In-memory repository backend.
//!
//! Backed by [`dashmap::DashMap`]; every operation touches a single entry
//! so per-record consistency matches the PostgreSQL backend.

mod assertion;
mod identity;
mod request;

pub use assertion::MemoryAssertionRepository;
pub use identity::MemoryIdentityRecordRepository;
pub use request::MemoryNotificationRequestRepository;
