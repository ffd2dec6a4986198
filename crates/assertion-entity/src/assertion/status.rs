//! Assertion lifecycle status.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use assertion_core::error::AppError;

/// Synchronization status of an assertion.
///
/// Derived from the assertion's fields and its affiliate's identity record;
/// only the notification statuses are ever set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssertionStatus {
    /// Waiting for the affiliate to link and for the first create.
    Pending,
    /// Edited since the last sync attempt.
    PendingRetry,
    /// Present in the registry and in sync.
    InOrcid,
    /// Removed from the registry on request.
    DeletedInOrcid,
    /// The affiliate revoked the organization's access.
    UserRevokedAccess,
    /// The affiliate denied the organization's access request.
    UserDeniedAccess,
    /// The affiliate's registry record no longer exists.
    UserDeletedFromOrcid,
    /// The last create attempt failed.
    ErrorAddingToOrcid,
    /// The last update attempt failed.
    ErrorUpdatingToOrcid,
    /// Queued for the next permission-link notification batch.
    NotificationRequested,
    /// A permission-link notification was delivered.
    NotificationSent,
    /// Delivering the permission-link notification failed.
    NotificationFailed,
}

impl AssertionStatus {
    /// All statuses.
    pub const ALL: [Self; 12] = [
        Self::Pending,
        Self::PendingRetry,
        Self::InOrcid,
        Self::DeletedInOrcid,
        Self::UserRevokedAccess,
        Self::UserDeniedAccess,
        Self::UserDeletedFromOrcid,
        Self::ErrorAddingToOrcid,
        Self::ErrorUpdatingToOrcid,
        Self::NotificationRequested,
        Self::NotificationSent,
        Self::NotificationFailed,
    ];

    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::PendingRetry => "PENDING_RETRY",
            Self::InOrcid => "IN_ORCID",
            Self::DeletedInOrcid => "DELETED_IN_ORCID",
            Self::UserRevokedAccess => "USER_REVOKED_ACCESS",
            Self::UserDeniedAccess => "USER_DENIED_ACCESS",
            Self::UserDeletedFromOrcid => "USER_DELETED_FROM_ORCID",
            Self::ErrorAddingToOrcid => "ERROR_ADDING_TO_ORCID",
            Self::ErrorUpdatingToOrcid => "ERROR_UPDATING_TO_ORCID",
            Self::NotificationRequested => "NOTIFICATION_REQUESTED",
            Self::NotificationSent => "NOTIFICATION_SENT",
            Self::NotificationFailed => "NOTIFICATION_FAILED",
        }
    }

    /// Whether the status belongs to the permission-notification lifecycle.
    /// These are set directly and never produced by derivation.
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            Self::NotificationRequested | Self::NotificationSent | Self::NotificationFailed
        )
    }
}

impl FromStr for AssertionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown assertion status '{s}'")))
    }
}

impl std::fmt::Display for AssertionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
