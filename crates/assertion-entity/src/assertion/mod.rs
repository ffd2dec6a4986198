//! Affiliation assertion domain entities.

pub mod error;
pub mod model;
pub mod section;
pub mod status;

pub use error::OrcidError;
pub use model::{Assertion, AssertionDraft, ExternalId, FuzzyDate, OrgDescriptor};
pub use section::AffiliationSection;
pub use status::AssertionStatus;
