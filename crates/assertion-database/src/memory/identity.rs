//! In-memory linked identity record repository.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use assertion_core::error::AppError;
use assertion_core::result::AppResult;
use assertion_entity::identity::LinkedIdentityRecord;

use crate::repositories::IdentityRecordRepository;

/// Identity record storage keyed by email.
#[derive(Debug, Default)]
pub struct MemoryIdentityRecordRepository {
    records: DashMap<String, LinkedIdentityRecord>,
}

impl MemoryIdentityRecordRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityRecordRepository for MemoryIdentityRecordRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<LinkedIdentityRecord>> {
        Ok(self.records.get(email).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, record: &LinkedIdentityRecord) -> AppResult<()> {
        match self.records.entry(record.email.clone()) {
            Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Identity record for {} already exists",
                record.email
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn save(&self, record: &LinkedIdentityRecord) -> AppResult<()> {
        let previous_email = self
            .records
            .iter()
            .find(|entry| entry.value().id == record.id)
            .map(|entry| entry.key().clone())
            .ok_or_else(|| {
                AppError::not_found(format!("Identity record {} not found", record.id))
            })?;

        if previous_email != record.email {
            if self.records.contains_key(&record.email) {
                return Err(AppError::conflict(format!(
                    "Identity record for {} already exists",
                    record.email
                )));
            }
            self.records.remove(&previous_email);
        }
        self.records.insert(record.email.clone(), record.clone());
        Ok(())
    }

    async fn delete_by_email(&self, email: &str) -> AppResult<bool> {
        Ok(self.records.remove(email).is_some())
    }
}
