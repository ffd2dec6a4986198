//! Stored status cleanup.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use assertion_service::AssertionService;

use super::STATUS_CLEANUP;
use crate::executor::{JobExecutionError, JobHandler};

/// Rewrites stored statuses that drifted from their derivation
#[derive(Debug)]
pub struct StatusCleanupHandler {
    assertions: Arc<AssertionService>,
}

impl StatusCleanupHandler {
    /// Create a new status cleanup handler
    pub fn new(assertions: Arc<AssertionService>) -> Self {
        Self { assertions }
    }
}

#[async_trait]
impl JobHandler for StatusCleanupHandler {
    fn job_type(&self) -> &str {
        STATUS_CLEANUP
    }

    async fn execute(&self) -> Result<Value, JobExecutionError> {
        let cleaned = self.assertions.status_cleanup().await.map_err(|e| {
            JobExecutionError::Transient(format!("Status cleanup failed: {}", e))
        })?;

        Ok(serde_json::json!({
            "task": STATUS_CLEANUP,
            "cleaned": cleaned,
        }))
    }
}
