//! Registry client trait.

use async_trait::async_trait;

use assertion_entity::assertion::Assertion;
use assertion_entity::notification::NotificationPermission;

use crate::error::RegistryError;

/// Operations the sync and notification paths need from the registry.
///
/// Every call is bounded by the client's request timeout.
#[async_trait]
pub trait RegistryClient: Send + Sync + 'static {
    /// Exchange an affiliate's long-lived id token for a short-lived
    /// access token scoped to their record.
    async fn exchange_token(&self, id_token: &str) -> Result<String, RegistryError>;

    /// Create the affiliation on `orcid`'s record and return the put-code.
    async fn create_affiliation(
        &self,
        orcid: &str,
        access_token: &str,
        assertion: &Assertion,
    ) -> Result<String, RegistryError>;

    /// Replace the affiliation identified by the assertion's put-code.
    async fn update_affiliation(
        &self,
        orcid: &str,
        access_token: &str,
        assertion: &Assertion,
    ) -> Result<(), RegistryError>;

    /// Remove the affiliation identified by the assertion's put-code.
    /// Returns `true` once the registry no longer holds it.
    async fn delete_affiliation(
        &self,
        orcid: &str,
        access_token: &str,
        assertion: &Assertion,
    ) -> Result<bool, RegistryError>;

    /// Look up the registry id of the record whose verified email is
    /// `email`. `None` unless exactly one record matches.
    async fn find_orcid_by_email(&self, email: &str) -> Result<Option<String>, RegistryError>;

    /// Deliver a permission-link notification to `orcid`'s inbox using the
    /// member's own client credentials.
    async fn post_notification(
        &self,
        orcid: &str,
        notification: &NotificationPermission,
    ) -> Result<(), RegistryError>;
}
