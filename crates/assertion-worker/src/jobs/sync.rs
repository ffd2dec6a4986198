//! Registry create and update sweeps.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use assertion_service::{SweepReport, SyncOrchestrator};

use super::{CREATE_SWEEP, UPDATE_SWEEP};
use crate::executor::{JobExecutionError, JobHandler};

/// Pushes new assertions to the registry
#[derive(Debug)]
pub struct CreateSweepHandler {
    orchestrator: Arc<SyncOrchestrator>,
}

impl CreateSweepHandler {
    /// Create a new create sweep handler
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobHandler for CreateSweepHandler {
    fn job_type(&self) -> &str {
        CREATE_SWEEP
    }

    async fn execute(&self) -> Result<Value, JobExecutionError> {
        let report = self
            .orchestrator
            .create_sweep()
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Create sweep failed: {}", e)))?;
        Ok(summary(CREATE_SWEEP, &report))
    }
}

/// Pushes edited assertions to the registry
#[derive(Debug)]
pub struct UpdateSweepHandler {
    orchestrator: Arc<SyncOrchestrator>,
}

impl UpdateSweepHandler {
    /// Create a new update sweep handler
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobHandler for UpdateSweepHandler {
    fn job_type(&self) -> &str {
        UPDATE_SWEEP
    }

    async fn execute(&self) -> Result<Value, JobExecutionError> {
        let report = self
            .orchestrator
            .update_sweep()
            .await
            .map_err(|e| JobExecutionError::Transient(format!("Update sweep failed: {}", e)))?;
        Ok(summary(UPDATE_SWEEP, &report))
    }
}

fn summary(task: &str, report: &SweepReport) -> Value {
    serde_json::json!({
        "task": task,
        "candidates": report.candidates,
        "synced": report.synced,
        "not_ready": report.not_ready,
        "skipped": report.skipped,
        "failed": report.failed,
    })
}
