//! Shared value types.

pub mod id;

pub use id::{AssertionId, IdentityRecordId, NotificationRequestId, UserId};
