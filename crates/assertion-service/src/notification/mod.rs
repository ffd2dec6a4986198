//! Batched permission-link notifications.

pub mod dispatcher;
pub mod permission;

pub use dispatcher::{NotificationDispatcher, SendReport};
pub use permission::build_permission_notification;
