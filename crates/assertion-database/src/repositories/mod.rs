//! Repository traits.
//!
//! Every operation is assumed strongly consistent for a single record.
//! Candidate queries return records in creation order.

use async_trait::async_trait;

use assertion_core::result::AppResult;
use assertion_core::types::AssertionId;
use assertion_entity::assertion::{Assertion, AssertionStatus};
use assertion_entity::identity::LinkedIdentityRecord;
use assertion_entity::notification::NotificationBatchRequest;

/// Storage of affiliation assertions.
#[async_trait]
pub trait AssertionRepository: Send + Sync + 'static {
    /// Find an assertion by id.
    async fn find_by_id(&self, id: AssertionId) -> AppResult<Option<Assertion>>;

    /// Assertions to create in the registry: no put-code, never deleted from
    /// the registry, and not pointing at a registry record that is gone.
    async fn find_pending_create(&self) -> AppResult<Vec<Assertion>>;

    /// Assertions edited since their last successful sync that already
    /// exist in the registry.
    async fn find_pending_update(&self) -> AppResult<Vec<Assertion>>;

    /// All assertions for an affiliate email, across organizations.
    async fn find_by_email(&self, email: &str) -> AppResult<Vec<Assertion>>;

    /// All assertions of an organization.
    async fn find_by_org(&self, org_id: &str) -> AppResult<Vec<Assertion>>;

    /// Assertions of an organization in the given status.
    async fn find_by_org_and_status(
        &self,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<Assertion>>;

    /// Assertions of one affiliate at one organization in the given status.
    async fn find_by_email_org_and_status(
        &self,
        email: &str,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<Assertion>>;

    /// Distinct affiliate emails with an assertion of `org_id` in `status`.
    async fn find_distinct_emails_with_status(
        &self,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<String>>;

    /// Every stored assertion.
    async fn find_all(&self) -> AppResult<Vec<Assertion>>;

    /// Store a new assertion. Fails with a conflict if the id exists.
    async fn insert(&self, assertion: &Assertion) -> AppResult<()>;

    /// Overwrite an existing assertion. Fails with not-found if missing.
    async fn save(&self, assertion: &Assertion) -> AppResult<()>;

    /// Delete an assertion. Returns `true` if it existed.
    async fn delete_by_id(&self, id: AssertionId) -> AppResult<bool>;
}

/// Storage of linked identity records, keyed by affiliate email.
#[async_trait]
pub trait IdentityRecordRepository: Send + Sync + 'static {
    /// Find the record for an email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<LinkedIdentityRecord>>;

    /// Store a new record. Fails with a conflict if the email is taken.
    async fn insert(&self, record: &LinkedIdentityRecord) -> AppResult<()>;

    /// Overwrite an existing record (matched by id, so the email may change).
    async fn save(&self, record: &LinkedIdentityRecord) -> AppResult<()>;

    /// Delete the record for an email. Returns `true` if it existed.
    async fn delete_by_email(&self, email: &str) -> AppResult<bool>;
}

/// Storage of notification batch requests.
#[async_trait]
pub trait NotificationRequestRepository: Send + Sync + 'static {
    /// All uncompleted requests, oldest first.
    async fn find_active(&self) -> AppResult<Vec<NotificationBatchRequest>>;

    /// The uncompleted request of an organization, if any.
    async fn find_active_by_org(&self, org_id: &str)
    -> AppResult<Option<NotificationBatchRequest>>;

    /// Atomically insert `request` unless its organization already has an
    /// active request. Returns `false` when nothing was inserted.
    async fn insert_if_none_active(&self, request: &NotificationBatchRequest) -> AppResult<bool>;

    /// Overwrite an existing request.
    async fn save(&self, request: &NotificationBatchRequest) -> AppResult<()>;
}
