//! Builds the aggregated permission notification for one affiliate.

use assertion_core::error::AppError;
use assertion_entity::assertion::Assertion;
use assertion_entity::notification::{ItemType, NotificationPermission, PermissionItem};

const INTRO: &str = "The organization below would like to add affiliations to your ORCID \
record. Follow the link to review the request and grant permission.";

/// One notification covering every pending assertion of an affiliate at
/// one organization. The organization name comes from the first assertion.
pub fn build_permission_notification(
    assertions: &[Assertion],
    authorization_url: String,
) -> Result<NotificationPermission, AppError> {
    let first = assertions
        .first()
        .ok_or_else(|| AppError::internal("Cannot build a notification without assertions"))?;

    let items = assertions
        .iter()
        .map(|assertion| PermissionItem {
            item_name: assertion.item_name(),
            item_type: ItemType::from(assertion.affiliation_section),
        })
        .collect();

    Ok(NotificationPermission {
        subject: format!(
            "{} has asked for permission to update your ORCID record",
            first.organization.name
        ),
        intro: INTRO.to_string(),
        authorization_url,
        items,
    })
}
