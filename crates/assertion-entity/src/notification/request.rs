//! Notification batch request entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assertion_core::types::NotificationRequestId;

/// An organization's request to notify every affiliate with an
/// outstanding permission link.
///
/// Active while `date_completed` is `None`; terminal once completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationBatchRequest {
    /// Unique identifier.
    pub id: NotificationRequestId,
    /// Login (email) of the portal user who asked for the batch.
    pub requested_by: String,
    /// Organization whose affiliates are notified.
    pub org_id: String,
    /// When the request was made.
    pub date_requested: DateTime<Utc>,
    /// When the send pass finished processing the request.
    pub date_completed: Option<DateTime<Utc>>,
}

impl NotificationBatchRequest {
    /// A new active request.
    pub fn new(
        requested_by: impl Into<String>,
        org_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationRequestId::new(),
            requested_by: requested_by.into(),
            org_id: org_id.into(),
            date_requested: now,
            date_completed: None,
        }
    }

    /// Whether the request still awaits a send pass.
    pub fn is_active(&self) -> bool {
        self.date_completed.is_none()
    }
}
