//! Permission notification send pass.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use assertion_service::NotificationDispatcher;

use super::NOTIFICATION_SEND;
use crate::executor::{JobExecutionError, JobHandler};

/// Completes every active notification batch request
#[derive(Debug)]
pub struct NotificationSendHandler {
    dispatcher: Arc<NotificationDispatcher>,
}

impl NotificationSendHandler {
    /// Create a new notification send handler
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl JobHandler for NotificationSendHandler {
    fn job_type(&self) -> &str {
        NOTIFICATION_SEND
    }

    async fn execute(&self) -> Result<Value, JobExecutionError> {
        let report = self.dispatcher.send_pass().await.map_err(|e| {
            JobExecutionError::Transient(format!("Notification send pass failed: {}", e))
        })?;

        Ok(serde_json::json!({
            "task": NOTIFICATION_SEND,
            "requests": report.requests,
            "sent": report.sent,
            "reverted": report.reverted,
            "failed": report.failed,
        }))
    }
}
