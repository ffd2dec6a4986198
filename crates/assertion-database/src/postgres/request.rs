//! PostgreSQL notification batch request repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use assertion_core::error::AppError;
use assertion_core::result::AppResult;
use assertion_core::types::NotificationRequestId;
use assertion_entity::notification::NotificationBatchRequest;

use super::db_error;
use crate::repositories::NotificationRequestRepository;

#[derive(Debug, FromRow)]
struct RequestRow {
    id: NotificationRequestId,
    requested_by: String,
    org_id: String,
    date_requested: DateTime<Utc>,
    date_completed: Option<DateTime<Utc>>,
}

impl From<RequestRow> for NotificationBatchRequest {
    fn from(row: RequestRow) -> Self {
        Self {
            id: row.id,
            requested_by: row.requested_by,
            org_id: row.org_id,
            date_requested: row.date_requested,
            date_completed: row.date_completed,
        }
    }
}

/// Request storage in the `notification_requests` table.
///
/// A partial unique index on `org_id WHERE date_completed IS NULL` backs
/// [`NotificationRequestRepository::insert_if_none_active`].
#[derive(Debug, Clone)]
pub struct PgNotificationRequestRepository {
    pool: PgPool,
}

impl PgNotificationRequestRepository {
    /// Create a new repository over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRequestRepository for PgNotificationRequestRepository {
    async fn find_active(&self) -> AppResult<Vec<NotificationBatchRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            "SELECT id, requested_by, org_id, date_requested, date_completed \
             FROM notification_requests WHERE date_completed IS NULL ORDER BY date_requested",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list active notification requests", e))?;
        Ok(rows.into_iter().map(NotificationBatchRequest::from).collect())
    }

    async fn find_active_by_org(
        &self,
        org_id: &str,
    ) -> AppResult<Option<NotificationBatchRequest>> {
        let row = sqlx::query_as::<_, RequestRow>(
            "SELECT id, requested_by, org_id, date_requested, date_completed \
             FROM notification_requests WHERE org_id = $1 AND date_completed IS NULL",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find active notification request", e))?;
        Ok(row.map(NotificationBatchRequest::from))
    }

    async fn insert_if_none_active(&self, request: &NotificationBatchRequest) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO notification_requests (id, requested_by, org_id, date_requested, date_completed) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (org_id) WHERE date_completed IS NULL DO NOTHING",
        )
        .bind(request.id)
        .bind(&request.requested_by)
        .bind(&request.org_id)
        .bind(request.date_requested)
        .bind(request.date_completed)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert notification request", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn save(&self, request: &NotificationBatchRequest) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notification_requests SET requested_by = $2, org_id = $3, \
             date_requested = $4, date_completed = $5 WHERE id = $1",
        )
        .bind(request.id)
        .bind(&request.requested_by)
        .bind(&request.org_id)
        .bind(request.date_requested)
        .bind(request.date_completed)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save notification request", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Notification request {} not found",
                request.id
            )));
        }
        Ok(())
    }
}
