//! PostgreSQL linked identity record repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use assertion_core::error::AppError;
use assertion_core::result::AppResult;
use assertion_core::types::IdentityRecordId;
use assertion_entity::identity::{LinkedIdentityRecord, RegistryToken};

use super::db_error;
use crate::repositories::IdentityRecordRepository;

/// Token slots live in a JSONB column alongside the record.
#[derive(Debug, FromRow)]
struct IdentityRow {
    id: IdentityRecordId,
    email: String,
    orcid: Option<String>,
    tokens: Json<Vec<RegistryToken>>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl From<IdentityRow> for LinkedIdentityRecord {
    fn from(row: IdentityRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            orcid: row.orcid,
            tokens: row.tokens.0,
            created: row.created,
            modified: row.modified,
        }
    }
}

/// Identity record storage in the `identity_records` table.
#[derive(Debug, Clone)]
pub struct PgIdentityRecordRepository {
    pool: PgPool,
}

impl PgIdentityRecordRepository {
    /// Create a new repository over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityRecordRepository for PgIdentityRecordRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<LinkedIdentityRecord>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, orcid, tokens, created, modified FROM identity_records WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find identity record", e))?;
        Ok(row.map(LinkedIdentityRecord::from))
    }

    async fn insert(&self, record: &LinkedIdentityRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO identity_records (id, email, orcid, tokens, created, modified) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id)
        .bind(&record.email)
        .bind(&record.orcid)
        .bind(Json(&record.tokens))
        .bind(record.created)
        .bind(record.modified)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::conflict(format!(
                "Identity record for {} already exists",
                record.email
            )),
            _ => db_error("Failed to insert identity record", e),
        })?;
        Ok(())
    }

    async fn save(&self, record: &LinkedIdentityRecord) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE identity_records SET email = $2, orcid = $3, tokens = $4, modified = $5 \
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(&record.email)
        .bind(&record.orcid)
        .bind(Json(&record.tokens))
        .bind(record.modified)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::conflict(format!(
                "Identity record for {} already exists",
                record.email
            )),
            _ => db_error("Failed to save identity record", e),
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Identity record {} not found",
                record.id
            )));
        }
        Ok(())
    }

    async fn delete_by_email(&self, email: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM identity_records WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete identity record", e))?;
        Ok(result.rows_affected() > 0)
    }
}
