//! In-memory assertion repository.

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use assertion_core::error::AppError;
use assertion_core::result::AppResult;
use assertion_core::types::AssertionId;
use assertion_entity::assertion::{Assertion, AssertionStatus};

use crate::repositories::AssertionRepository;

/// Assertion storage held in process memory.
#[derive(Debug, Default)]
pub struct MemoryAssertionRepository {
    assertions: DashMap<AssertionId, Assertion>,
}

impl MemoryAssertionRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, filter: impl Fn(&Assertion) -> bool) -> Vec<Assertion> {
        let mut found: Vec<Assertion> = self
            .assertions
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        found
    }
}

#[async_trait]
impl AssertionRepository for MemoryAssertionRepository {
    async fn find_by_id(&self, id: AssertionId) -> AppResult<Option<Assertion>> {
        Ok(self.assertions.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_pending_create(&self) -> AppResult<Vec<Assertion>> {
        Ok(self.collect(|a| {
            !a.has_put_code()
                && a.deleted_from_registry.is_none()
                && a.status != AssertionStatus::UserDeletedFromOrcid
        }))
    }

    async fn find_pending_update(&self) -> AppResult<Vec<Assertion>> {
        Ok(self.collect(|a| a.updated && a.has_put_code() && a.deleted_from_registry.is_none()))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Vec<Assertion>> {
        Ok(self.collect(|a| a.email == email))
    }

    async fn find_by_org(&self, org_id: &str) -> AppResult<Vec<Assertion>> {
        Ok(self.collect(|a| a.org_id == org_id))
    }

    async fn find_by_org_and_status(
        &self,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<Assertion>> {
        Ok(self.collect(|a| a.org_id == org_id && a.status == status))
    }

    async fn find_by_email_org_and_status(
        &self,
        email: &str,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<Assertion>> {
        Ok(self.collect(|a| a.email == email && a.org_id == org_id && a.status == status))
    }

    async fn find_distinct_emails_with_status(
        &self,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<String>> {
        let emails: BTreeSet<String> = self
            .collect(|a| a.org_id == org_id && a.status == status)
            .into_iter()
            .map(|a| a.email)
            .collect();
        Ok(emails.into_iter().collect())
    }

    async fn find_all(&self) -> AppResult<Vec<Assertion>> {
        Ok(self.collect(|_| true))
    }

    async fn insert(&self, assertion: &Assertion) -> AppResult<()> {
        match self.assertions.entry(assertion.id) {
            Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Assertion {} already exists",
                assertion.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(assertion.clone());
                Ok(())
            }
        }
    }

    async fn save(&self, assertion: &Assertion) -> AppResult<()> {
        match self.assertions.get_mut(&assertion.id) {
            Some(mut entry) => {
                *entry = assertion.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!(
                "Assertion {} not found",
                assertion.id
            ))),
        }
    }

    async fn delete_by_id(&self, id: AssertionId) -> AppResult<bool> {
        Ok(self.assertions.remove(&id).is_some())
    }
}
