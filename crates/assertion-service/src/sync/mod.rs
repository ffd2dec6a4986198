//! Registry synchronization: create and update sweeps, explicit deletes.

pub mod orchestrator;
pub mod report;

pub use orchestrator::SyncOrchestrator;
pub use report::{DeleteOutcome, EntryOutcome, SweepReport};
