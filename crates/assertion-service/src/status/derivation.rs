//! Status derivation state machine.

use assertion_entity::assertion::{Assertion, AssertionStatus};
use assertion_entity::identity::LinkedIdentityRecord;

use super::classifier::classify_error;

/// Compute an assertion's lifecycle status from its own fields and its
/// affiliate's identity record.
///
/// Rules are evaluated in order and the first match wins:
///
/// 1. access revoked for the organization
/// 2. access denied for the organization
/// 3. a registry error not superseded by a later edit
/// 4. deleted from the registry
/// 5. edited since the last sync attempt
/// 6. never created in the registry
/// 7. in the registry
pub fn derive_status(assertion: &Assertion, record: &LinkedIdentityRecord) -> AssertionStatus {
    if record.revoked_date(&assertion.org_id).is_some() {
        return AssertionStatus::UserRevokedAccess;
    }
    if record.denied_date(&assertion.org_id).is_some() {
        return AssertionStatus::UserDeniedAccess;
    }

    let modified_since_sync = assertion.modified_since_last_sync();

    if let Some(error) = &assertion.orcid_error {
        if !modified_since_sync {
            return classify_error(error, assertion.has_put_code());
        }
    }
    if assertion.deleted_from_registry.is_some() {
        return AssertionStatus::DeletedInOrcid;
    }
    if modified_since_sync {
        return AssertionStatus::PendingRetry;
    }
    if !assertion.has_put_code() {
        return AssertionStatus::Pending;
    }
    AssertionStatus::InOrcid
}
