//! Scheduled sweep configuration.

use serde::{Deserialize, Serialize};

/// Background sweep configuration.
///
/// Schedules are six-field cron expressions (seconds first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the scheduler is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of entries processed concurrently within one sweep.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Create sweep schedule.
    #[serde(default = "default_create_schedule")]
    pub create_schedule: String,
    /// Update sweep schedule.
    #[serde(default = "default_update_schedule")]
    pub update_schedule: String,
    /// Notification send sweep schedule.
    #[serde(default = "default_notification_schedule")]
    pub notification_schedule: String,
    /// Status cleanup schedule.
    #[serde(default = "default_status_cleanup_schedule")]
    pub status_cleanup_schedule: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            create_schedule: default_create_schedule(),
            update_schedule: default_update_schedule(),
            notification_schedule: default_notification_schedule(),
            status_cleanup_schedule: default_status_cleanup_schedule(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_create_schedule() -> String {
    "0 */5 * * * *".to_string()
}

fn default_update_schedule() -> String {
    "0 2-59/5 * * * *".to_string()
}

fn default_notification_schedule() -> String {
    "0 */10 * * * *".to_string()
}

fn default_status_cleanup_schedule() -> String {
    "0 0 3 * * *".to_string()
}
