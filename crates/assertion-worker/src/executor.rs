//! Job executor: dispatches a job type to its registered handler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing;

use assertion_core::error::AppError;

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Get the job type this handler processes
    fn job_type(&self) -> &str;

    /// Run the job once, returning a summary of what it did
    async fn execute(&self) -> Result<Value, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure, the next tick will fail the same way
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure, the next tick may succeed
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// A handler and the guard that keeps its runs from overlapping.
#[derive(Debug)]
struct Registration {
    handler: Arc<dyn JobHandler>,
    running: Mutex<()>,
}

/// Dispatches jobs to the appropriate handler based on job type
#[derive(Debug, Default)]
pub struct JobExecutor {
    /// Registered job handlers by type
    handlers: HashMap<String, Registration>,
}

impl JobExecutor {
    /// Create a new job executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        tracing::info!("Registered job handler for type '{}'", job_type);
        self.handlers.insert(
            job_type,
            Registration {
                handler,
                running: Mutex::new(()),
            },
        );
    }

    /// Run the handler for `job_type`.
    ///
    /// Returns `Ok(None)` without running anything when the previous run
    /// of the same job is still in progress.
    pub async fn execute(&self, job_type: &str) -> Result<Option<Value>, JobExecutionError> {
        let registration = self.handlers.get(job_type).ok_or_else(|| {
            JobExecutionError::Permanent(format!(
                "No handler registered for job type '{}'",
                job_type
            ))
        })?;

        let Ok(_running) = registration.running.try_lock() else {
            tracing::debug!(job_type, "Previous run still in progress; skipping tick");
            return Ok(None);
        };

        tracing::info!(job_type, "Executing job");
        let result = registration.handler.execute().await;
        match &result {
            Ok(summary) => tracing::info!(job_type, summary = %summary, "Job completed"),
            Err(e) => tracing::error!(job_type, error = %e, "Job failed"),
        }
        result.map(Some)
    }

    /// Check if a handler is registered for a job type
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use super::*;

    #[derive(Debug, Default)]
    struct BlockingHandler {
        runs: AtomicUsize,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl JobHandler for BlockingHandler {
        fn job_type(&self) -> &str {
            "blocking"
        }

        async fn execute(&self) -> Result<Value, JobExecutionError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(serde_json::json!({ "task": "blocking" }))
        }
    }

    #[derive(Debug)]
    struct FailingHandler;

    #[async_trait]
    impl JobHandler for FailingHandler {
        fn job_type(&self) -> &str {
            "failing"
        }

        async fn execute(&self) -> Result<Value, JobExecutionError> {
            Err(JobExecutionError::Transient("registry unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unknown_job_type_is_permanent_failure() {
        let executor = JobExecutor::new();
        let err = executor.execute("missing").await.expect_err("no handler");
        assert!(matches!(err, JobExecutionError::Permanent(_)));
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let handler = Arc::new(BlockingHandler::default());
        let mut executor = JobExecutor::new();
        executor.register(Arc::clone(&handler) as Arc<dyn JobHandler>);
        let executor = Arc::new(executor);

        let first = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.execute("blocking").await })
        };
        handler.started.notified().await;

        let second = executor.execute("blocking").await.expect("second tick");
        assert!(second.is_none());

        handler.release.notify_one();
        let first = first.await.expect("join").expect("first tick");
        assert!(first.is_some());
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_is_released_after_failure() {
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(FailingHandler));

        assert!(executor.execute("failing").await.is_err());
        let err = executor.execute("failing").await.expect_err("runs again");
        assert!(matches!(err, JobExecutionError::Transient(_)));
        assert!(executor.has_handler("failing"));
    }
}
