//! Maps a stored registry error to an assertion status.

use assertion_entity::assertion::{AssertionStatus, OrcidError};

const INVALID_SCOPE: &str = "invalid_scope";

/// Classify the last registry error of an assertion.
///
/// `has_put_code` decides between the adding and updating error statuses
/// for anything not recognised as a record deletion or a revoked grant.
pub fn classify_error(error: &OrcidError, has_put_code: bool) -> AssertionStatus {
    match error.status_code {
        404 => AssertionStatus::UserDeletedFromOrcid,
        401 => AssertionStatus::UserRevokedAccess,
        400 if error.error.contains(INVALID_SCOPE) => AssertionStatus::UserRevokedAccess,
        _ if has_put_code => AssertionStatus::ErrorUpdatingToOrcid,
        _ => AssertionStatus::ErrorAddingToOrcid,
    }
}
