//! Built-in job handler implementations.

pub mod notification;
pub mod status;
pub mod sync;

pub use notification::NotificationSendHandler;
pub use status::StatusCleanupHandler;
pub use sync::{CreateSweepHandler, UpdateSweepHandler};

/// Job type of the create sweep.
pub const CREATE_SWEEP: &str = "create_sweep";
/// Job type of the update sweep.
pub const UPDATE_SWEEP: &str = "update_sweep";
/// Job type of the notification send pass.
pub const NOTIFICATION_SEND: &str = "notification_send";
/// Job type of the status cleanup.
pub const STATUS_CLEANUP: &str = "status_cleanup";
