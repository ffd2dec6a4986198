//! Permission-link notification payload.

use serde::{Deserialize, Serialize};

use crate::assertion::AffiliationSection;

/// Item kinds the registry accepts in a permission notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    Distinction,
    Education,
    Employment,
    InvitedPosition,
    Membership,
    Qualification,
    Service,
}

impl From<AffiliationSection> for ItemType {
    fn from(section: AffiliationSection) -> Self {
        match section {
            AffiliationSection::Distinction => Self::Distinction,
            AffiliationSection::Education => Self::Education,
            AffiliationSection::Employment => Self::Employment,
            AffiliationSection::InvitedPosition => Self::InvitedPosition,
            AffiliationSection::Membership => Self::Membership,
            AffiliationSection::Qualification => Self::Qualification,
            AffiliationSection::Service => Self::Service,
        }
    }
}

/// One line of a permission notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionItem {
    /// `"<org name> : <role title>"`.
    pub item_name: String,
    /// Kind of the pending affiliation.
    pub item_type: ItemType,
}

/// Aggregated permission request sent to one affiliate on behalf of one
/// organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPermission {
    /// Subject line.
    pub subject: String,
    /// Introductory text.
    pub intro: String,
    /// Link the affiliate follows to grant access.
    pub authorization_url: String,
    /// One entry per pending assertion.
    pub items: Vec<PermissionItem>,
}
