//! Request context carrying the acting portal user and their organization.

use serde::{Deserialize, Serialize};

use assertion_core::error::AppError;
use assertion_core::types::UserId;
use assertion_entity::assertion::Assertion;

/// Context for the current authenticated request.
///
/// Resolved by the caller's authentication layer and passed into service
/// methods so that every operation knows *who* is acting and for *which*
/// organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user's ID.
    pub user_id: UserId,
    /// The user's login (email).
    pub login: String,
    /// The user's own organization.
    pub org_id: String,
    /// Organization the user is acting for through login-as delegation.
    pub login_as_org: Option<String>,
}

impl RequestContext {
    /// Creates a new request context without delegation.
    pub fn new(user_id: UserId, login: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            user_id,
            login: login.into(),
            org_id: org_id.into(),
            login_as_org: None,
        }
    }

    /// Act on behalf of another organization.
    pub fn login_as(mut self, org_id: impl Into<String>) -> Self {
        self.login_as_org = Some(org_id.into());
        self
    }

    /// The organization this request acts for.
    pub fn effective_org(&self) -> &str {
        self.login_as_org
            .as_deref()
            .filter(|org| !org.trim().is_empty())
            .unwrap_or(&self.org_id)
    }

    /// Reject access to an assertion owned by another organization.
    pub fn authorize(&self, assertion: &Assertion) -> Result<(), AppError> {
        if assertion.org_id == self.effective_org() {
            Ok(())
        } else {
            Err(AppError::authorization(format!(
                "Assertion {} does not belong to organization {}",
                assertion.id,
                self.effective_org()
            )))
        }
    }
}
