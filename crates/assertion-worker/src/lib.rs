//! Scheduled background jobs.
//!
//! This crate provides:
//! - A job executor that dispatches a job type to its handler and never
//!   runs two instances of the same job at once
//! - A cron scheduler that triggers the executor
//! - Handlers for the create and update sweeps, the notification send
//!   pass, and the status cleanup

pub mod executor;
pub mod jobs;
pub mod scheduler;

pub use executor::JobExecutor;
pub use scheduler::CronScheduler;
