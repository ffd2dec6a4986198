//! Linked identity record entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assertion_core::types::IdentityRecordId;

/// One organization's access grant on an affiliate's registry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryToken {
    /// Organization the grant belongs to.
    pub org_id: String,
    /// Long-lived id token issued when the affiliate granted access.
    /// `None` until linking completes, and again after a revocation.
    pub token_id: Option<String>,
    /// When the affiliate denied the organization's request.
    pub denied_date: Option<DateTime<Utc>>,
    /// When the affiliate revoked a previously granted access.
    pub revoked_date: Option<DateTime<Utc>>,
}

impl RegistryToken {
    /// An empty slot for an organization that has not been granted access yet.
    pub fn slot(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            token_id: None,
            denied_date: None,
            revoked_date: None,
        }
    }

    fn belongs_to(&self, org_id: &str) -> bool {
        self.org_id.trim() == org_id.trim()
    }
}

/// Per-affiliate record of registry identity and per-organization tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedIdentityRecord {
    /// Unique identifier.
    pub id: IdentityRecordId,
    /// Affiliate email; unique.
    pub email: String,
    /// Registry identifier (ORCID iD), set once the affiliate links.
    pub orcid: Option<String>,
    /// One token slot per organization.
    pub tokens: Vec<RegistryToken>,
    /// When the record was created.
    pub created: DateTime<Utc>,
    /// When the record was last changed.
    pub modified: DateTime<Utc>,
}

impl LinkedIdentityRecord {
    /// A fresh record with a single empty token slot.
    pub fn new(email: impl Into<String>, org_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: IdentityRecordId::new(),
            email: email.into(),
            orcid: None,
            tokens: vec![RegistryToken::slot(org_id)],
            created: now,
            modified: now,
        }
    }

    /// Registry identifier, if linked and not blank.
    pub fn orcid(&self) -> Option<&str> {
        self.orcid
            .as_deref()
            .map(str::trim)
            .filter(|orcid| !orcid.is_empty())
    }

    /// The token slot for `org_id`.
    pub fn token_slot(&self, org_id: &str) -> Option<&RegistryToken> {
        self.tokens.iter().find(|t| t.belongs_to(org_id))
    }

    /// Mutable token slot for `org_id`.
    pub fn token_slot_mut(&mut self, org_id: &str) -> Option<&mut RegistryToken> {
        self.tokens.iter_mut().find(|t| t.belongs_to(org_id))
    }

    /// The usable id token for `org_id`.
    pub fn token_for(&self, org_id: &str) -> Option<&str> {
        self.token_slot(org_id)
            .and_then(|t| t.token_id.as_deref())
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// When the affiliate revoked `org_id`'s access.
    pub fn revoked_date(&self, org_id: &str) -> Option<DateTime<Utc>> {
        self.token_slot(org_id).and_then(|t| t.revoked_date)
    }

    /// When the affiliate denied `org_id`'s access request.
    pub fn denied_date(&self, org_id: &str) -> Option<DateTime<Utc>> {
        self.token_slot(org_id).and_then(|t| t.denied_date)
    }
}
