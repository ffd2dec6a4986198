//! Affiliation kind enumeration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use assertion_core::error::AppError;

/// The section of the affiliate's registry record an assertion lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AffiliationSection {
    /// Award or honour.
    Distinction,
    /// Study at an institution.
    Education,
    /// Paid or unpaid work.
    Employment,
    /// Visiting or honorary position.
    InvitedPosition,
    /// Membership of a society or association.
    Membership,
    /// Professional qualification.
    Qualification,
    /// Donated time or service.
    Service,
}

impl AffiliationSection {
    /// All sections, in registry order.
    pub const ALL: [Self; 7] = [
        Self::Distinction,
        Self::Education,
        Self::Employment,
        Self::InvitedPosition,
        Self::Membership,
        Self::Qualification,
        Self::Service,
    ];

    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distinction => "DISTINCTION",
            Self::Education => "EDUCATION",
            Self::Employment => "EMPLOYMENT",
            Self::InvitedPosition => "INVITED_POSITION",
            Self::Membership => "MEMBERSHIP",
            Self::Qualification => "QUALIFICATION",
            Self::Service => "SERVICE",
        }
    }

    /// Path segment used by the registry's affiliation endpoints.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Distinction => "distinction",
            Self::Education => "education",
            Self::Employment => "employment",
            Self::InvitedPosition => "invited-position",
            Self::Membership => "membership",
            Self::Qualification => "qualification",
            Self::Service => "service",
        }
    }
}

impl FromStr for AffiliationSection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::validation(format!("Unknown affiliation section '{s}'")))
    }
}

impl std::fmt::Display for AffiliationSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
