//! In-memory notification batch request repository.

use std::sync::Mutex;

use async_trait::async_trait;

use assertion_core::error::AppError;
use assertion_core::result::AppResult;
use assertion_entity::notification::NotificationBatchRequest;

use crate::repositories::NotificationRequestRepository;

/// Request storage; a single lock makes check-and-insert atomic.
#[derive(Debug, Default)]
pub struct MemoryNotificationRequestRepository {
    requests: Mutex<Vec<NotificationBatchRequest>>,
}

impl MemoryNotificationRequestRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Vec<NotificationBatchRequest>>> {
        self.requests
            .lock()
            .map_err(|_| AppError::internal("Notification request store lock poisoned"))
    }
}

#[async_trait]
impl NotificationRequestRepository for MemoryNotificationRequestRepository {
    async fn find_active(&self) -> AppResult<Vec<NotificationBatchRequest>> {
        let mut active: Vec<NotificationBatchRequest> =
            self.lock()?.iter().filter(|r| r.is_active()).cloned().collect();
        active.sort_by_key(|r| r.date_requested);
        Ok(active)
    }

    async fn find_active_by_org(
        &self,
        org_id: &str,
    ) -> AppResult<Option<NotificationBatchRequest>> {
        Ok(self
            .lock()?
            .iter()
            .find(|r| r.is_active() && r.org_id == org_id)
            .cloned())
    }

    async fn insert_if_none_active(&self, request: &NotificationBatchRequest) -> AppResult<bool> {
        let mut requests = self.lock()?;
        if requests
            .iter()
            .any(|r| r.is_active() && r.org_id == request.org_id)
        {
            return Ok(false);
        }
        requests.push(request.clone());
        Ok(true)
    }

    async fn save(&self, request: &NotificationBatchRequest) -> AppResult<()> {
        let mut requests = self.lock()?;
        let existing = requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or_else(|| {
                AppError::not_found(format!("Notification request {} not found", request.id))
            })?;
        *existing = request.clone();
        Ok(())
    }
}
