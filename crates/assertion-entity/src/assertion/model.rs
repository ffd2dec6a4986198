//! Affiliation assertion entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assertion_core::types::{AssertionId, UserId};

use super::error::OrcidError;
use super::section::AffiliationSection;
use super::status::AssertionStatus;

/// A partial date as the registry models it: the year is required,
/// month and day are optional. Values are kept as entered (`"2021"`, `"03"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyDate {
    /// Four-digit year.
    pub year: String,
    /// Two-digit month.
    pub month: Option<String>,
    /// Two-digit day.
    pub day: Option<String>,
}

impl FuzzyDate {
    /// A year-only date.
    pub fn year(year: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            month: None,
            day: None,
        }
    }
}

/// The organization the affiliation is held at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrgDescriptor {
    /// Organization display name.
    pub name: String,
    /// City.
    pub city: String,
    /// ISO 3166 country code.
    pub country: String,
    /// Region or state.
    pub region: Option<String>,
    /// Identifier in the disambiguation source (RINGGOLD, GRID, ROR ...).
    pub disambiguated_org_id: Option<String>,
    /// Name of the disambiguation source.
    pub disambiguation_source: Option<String>,
}

/// External identifier of the affiliation itself (e.g. a grant number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalId {
    /// Identifier value.
    pub value: String,
    /// Identifier type as understood by the registry.
    pub id_type: String,
    /// Resolvable URL.
    pub url: Option<String>,
}

/// Member-editable fields of an assertion.
///
/// Used as input for create and update; everything else on [`Assertion`]
/// is owned by the sync path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionDraft {
    /// Affiliate email.
    pub email: String,
    /// Affiliation kind.
    pub affiliation_section: AffiliationSection,
    /// Role title.
    pub role_title: Option<String>,
    /// Department name.
    pub department_name: Option<String>,
    /// Start date.
    pub start_date: Option<FuzzyDate>,
    /// End date.
    pub end_date: Option<FuzzyDate>,
    /// Organization descriptor.
    pub organization: OrgDescriptor,
    /// External identifier.
    pub external_id: Option<ExternalId>,
    /// Affiliation URL.
    pub url: Option<String>,
}

/// A claim that an affiliate holds a role at an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Unique identifier.
    pub id: AssertionId,
    /// Portal user who created the assertion.
    pub owner_id: UserId,
    /// Owning organization (member) identifier.
    pub org_id: String,
    /// Affiliate email; key of the linked identity record.
    pub email: String,
    /// Affiliation kind.
    pub affiliation_section: AffiliationSection,
    /// Role title.
    pub role_title: Option<String>,
    /// Department name.
    pub department_name: Option<String>,
    /// Start date.
    pub start_date: Option<FuzzyDate>,
    /// End date.
    pub end_date: Option<FuzzyDate>,
    /// Organization descriptor.
    pub organization: OrgDescriptor,
    /// External identifier.
    pub external_id: Option<ExternalId>,
    /// Affiliation URL.
    pub url: Option<String>,
    /// Registry-assigned identifier, set by the first successful create.
    pub put_code: Option<String>,
    /// Derived synchronization status.
    pub status: AssertionStatus,
    /// When the sync path last talked to the registry for this assertion.
    pub last_sync_attempt: Option<DateTime<Utc>>,
    /// When the assertion was created.
    pub created: DateTime<Utc>,
    /// When a member last edited the assertion.
    pub modified: Option<DateTime<Utc>>,
    /// Login of the last editor.
    pub last_modified_by: Option<String>,
    /// Edited since the last successful sync.
    pub updated: bool,
    /// When the registry first accepted the assertion.
    pub added_to_registry: Option<DateTime<Utc>>,
    /// When the registry last accepted a create or update.
    pub updated_in_registry: Option<DateTime<Utc>>,
    /// When the assertion was removed from the registry.
    pub deleted_from_registry: Option<DateTime<Utc>>,
    /// Last registry error.
    pub orcid_error: Option<OrcidError>,
    /// When a permission-link notification was delivered.
    pub notification_sent: Option<DateTime<Utc>>,
}

impl Assertion {
    /// Build a new, not yet stored assertion from a draft.
    pub fn from_draft(
        draft: AssertionDraft,
        owner_id: UserId,
        org_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AssertionId::new(),
            owner_id,
            org_id: org_id.into(),
            email: draft.email,
            affiliation_section: draft.affiliation_section,
            role_title: draft.role_title,
            department_name: draft.department_name,
            start_date: draft.start_date,
            end_date: draft.end_date,
            organization: draft.organization,
            external_id: draft.external_id,
            url: draft.url,
            put_code: None,
            status: AssertionStatus::Pending,
            last_sync_attempt: None,
            created: now,
            modified: Some(now),
            last_modified_by: None,
            updated: false,
            added_to_registry: None,
            updated_in_registry: None,
            deleted_from_registry: None,
            orcid_error: None,
            notification_sent: None,
        }
    }

    /// Copy the member-editable fields of `draft` onto this assertion.
    pub fn apply_draft(&mut self, draft: AssertionDraft) {
        self.email = draft.email;
        self.affiliation_section = draft.affiliation_section;
        self.role_title = draft.role_title;
        self.department_name = draft.department_name;
        self.start_date = draft.start_date;
        self.end_date = draft.end_date;
        self.organization = draft.organization;
        self.external_id = draft.external_id;
        self.url = draft.url;
    }

    /// Registry put-code, if one has been assigned and is not blank.
    pub fn put_code(&self) -> Option<&str> {
        self.put_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    /// Whether the registry already holds this assertion.
    pub fn has_put_code(&self) -> bool {
        self.put_code().is_some()
    }

    /// Whether a member edited the assertion after the last sync attempt.
    ///
    /// False when either timestamp is missing.
    pub fn modified_since_last_sync(&self) -> bool {
        match (self.modified, self.last_sync_attempt) {
            (Some(modified), Some(attempt)) => modified > attempt,
            _ => false,
        }
    }

    /// Display line used in permission notifications.
    pub fn item_name(&self) -> String {
        format!(
            "{} : {}",
            self.organization.name,
            self.role_title.as_deref().unwrap_or_default()
        )
    }
}
