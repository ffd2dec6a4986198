//! Sweep and delete outcomes.

use serde::Serialize;

/// What happened to one sweep candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOutcome {
    /// The registry accepted the change and the assertion was updated.
    Synced,
    /// The affiliate has not completed linking; nothing was done.
    NotReady,
    /// The candidate no longer needed the action when it was processed.
    Skipped,
    /// The attempt failed; the error is stored on the assertion or logged.
    Failed,
}

/// Counts for one sweep invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Candidates returned by the repository.
    pub candidates: usize,
    /// Candidates synced.
    pub synced: usize,
    /// Candidates skipped because the affiliate is not linked.
    pub not_ready: usize,
    /// Candidates that no longer needed the action.
    pub skipped: usize,
    /// Candidates that failed.
    pub failed: usize,
}

impl SweepReport {
    /// Tally a sequence of entry outcomes.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = EntryOutcome>) -> Self {
        outcomes.into_iter().fold(Self::default(), |mut report, outcome| {
            report.candidates += 1;
            match outcome {
                EntryOutcome::Synced => report.synced += 1,
                EntryOutcome::NotReady => report.not_ready += 1,
                EntryOutcome::Skipped => report.skipped += 1,
                EntryOutcome::Failed => report.failed += 1,
            }
            report
        })
    }
}

/// Result of an explicit delete from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The registry no longer holds the affiliation.
    Deleted,
    /// The affiliate has not completed linking for the organization.
    NotReady,
    /// The registry refused or the call failed; the error is stored.
    Failed,
}
