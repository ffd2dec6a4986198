//! Cron scheduler for the sweeps.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use assertion_core::config::WorkerConfig;
use assertion_core::error::AppError;

use crate::executor::JobExecutor;
use crate::jobs::{CREATE_SWEEP, NOTIFICATION_SEND, STATUS_CLEANUP, UPDATE_SWEEP};

/// Cron-based scheduler for the periodic sweeps
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Executor the ticks are dispatched to
    executor: Arc<JobExecutor>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(executor: Arc<JobExecutor>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            executor,
        })
    }

    /// Register the create, update, notification, and cleanup schedules
    pub async fn register_default_tasks(&self, config: &WorkerConfig) -> Result<(), AppError> {
        self.register(CREATE_SWEEP, &config.create_schedule).await?;
        self.register(UPDATE_SWEEP, &config.update_schedule).await?;
        self.register(NOTIFICATION_SEND, &config.notification_schedule)
            .await?;
        self.register(STATUS_CLEANUP, &config.status_cleanup_schedule)
            .await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Schedule `job_type` on a six-field cron expression
    pub async fn register(&self, job_type: &'static str, schedule: &str) -> Result<(), AppError> {
        if !self.executor.has_handler(job_type) {
            return Err(AppError::configuration(format!(
                "No handler registered for scheduled job '{}'",
                job_type
            )));
        }

        let executor = Arc::clone(&self.executor);
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let executor = Arc::clone(&executor);
            Box::pin(async move {
                tracing::debug!(job_type, "Scheduled tick");
                // Failures are logged by the executor; the next tick retries.
                let _ = executor.execute(job_type).await;
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid schedule '{}' for {}: {}",
                schedule, job_type, e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add {} schedule: {}", job_type, e))
        })?;

        tracing::info!("Registered: {} ({})", job_type, schedule);
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
