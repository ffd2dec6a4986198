//! Notification domain entities.

pub mod permission;
pub mod request;

pub use permission::{ItemType, NotificationPermission, PermissionItem};
pub use request::NotificationBatchRequest;
