//! PostgreSQL assertion repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{FromRow, PgPool, Postgres};

use assertion_core::error::AppError;
use assertion_core::result::AppResult;
use assertion_core::types::{AssertionId, UserId};
use assertion_entity::assertion::{
    Assertion, AssertionStatus, ExternalId, FuzzyDate, OrcidError, OrgDescriptor,
};

use super::db_error;
use crate::repositories::AssertionRepository;

const COLUMNS: &str = "id, owner_id, org_id, email, affiliation_section, role_title, \
     department_name, start_year, start_month, start_day, end_year, end_month, end_day, \
     org_name, org_city, org_country, org_region, disambiguated_org_id, disambiguation_source, \
     external_id, external_id_type, external_id_url, url, put_code, status, last_sync_attempt, \
     created, modified, last_modified_by, updated, added_to_registry, updated_in_registry, \
     deleted_from_registry, orcid_error, notification_sent";

const ORDER: &str = "ORDER BY created ASC, id ASC";

/// Flat row shape of the `assertions` table.
#[derive(Debug, FromRow)]
struct AssertionRow {
    id: AssertionId,
    owner_id: UserId,
    org_id: String,
    email: String,
    affiliation_section: String,
    role_title: Option<String>,
    department_name: Option<String>,
    start_year: Option<String>,
    start_month: Option<String>,
    start_day: Option<String>,
    end_year: Option<String>,
    end_month: Option<String>,
    end_day: Option<String>,
    org_name: String,
    org_city: String,
    org_country: String,
    org_region: Option<String>,
    disambiguated_org_id: Option<String>,
    disambiguation_source: Option<String>,
    external_id: Option<String>,
    external_id_type: Option<String>,
    external_id_url: Option<String>,
    url: Option<String>,
    put_code: Option<String>,
    status: String,
    last_sync_attempt: Option<DateTime<Utc>>,
    created: DateTime<Utc>,
    modified: Option<DateTime<Utc>>,
    last_modified_by: Option<String>,
    updated: bool,
    added_to_registry: Option<DateTime<Utc>>,
    updated_in_registry: Option<DateTime<Utc>>,
    deleted_from_registry: Option<DateTime<Utc>>,
    orcid_error: Option<String>,
    notification_sent: Option<DateTime<Utc>>,
}

fn split_date(date: Option<FuzzyDate>) -> (Option<String>, Option<String>, Option<String>) {
    match date {
        Some(d) => (Some(d.year), d.month, d.day),
        None => (None, None, None),
    }
}

fn join_date(year: Option<String>, month: Option<String>, day: Option<String>) -> Option<FuzzyDate> {
    year.map(|year| FuzzyDate { year, month, day })
}

impl TryFrom<&Assertion> for AssertionRow {
    type Error = AppError;

    fn try_from(a: &Assertion) -> Result<Self, Self::Error> {
        let a = a.clone();
        let (start_year, start_month, start_day) = split_date(a.start_date);
        let (end_year, end_month, end_day) = split_date(a.end_date);
        let (external_id, external_id_type, external_id_url) = match a.external_id {
            Some(ext) => (Some(ext.value), Some(ext.id_type), ext.url),
            None => (None, None, None),
        };
        let orcid_error = a.orcid_error.as_ref().map(OrcidError::to_json).transpose()?;

        Ok(Self {
            id: a.id,
            owner_id: a.owner_id,
            org_id: a.org_id,
            email: a.email,
            affiliation_section: a.affiliation_section.as_str().to_string(),
            role_title: a.role_title,
            department_name: a.department_name,
            start_year,
            start_month,
            start_day,
            end_year,
            end_month,
            end_day,
            org_name: a.organization.name,
            org_city: a.organization.city,
            org_country: a.organization.country,
            org_region: a.organization.region,
            disambiguated_org_id: a.organization.disambiguated_org_id,
            disambiguation_source: a.organization.disambiguation_source,
            external_id,
            external_id_type,
            external_id_url,
            url: a.url,
            put_code: a.put_code,
            status: a.status.as_str().to_string(),
            last_sync_attempt: a.last_sync_attempt,
            created: a.created,
            modified: a.modified,
            last_modified_by: a.last_modified_by,
            updated: a.updated,
            added_to_registry: a.added_to_registry,
            updated_in_registry: a.updated_in_registry,
            deleted_from_registry: a.deleted_from_registry,
            orcid_error,
            notification_sent: a.notification_sent,
        })
    }
}

impl TryFrom<AssertionRow> for Assertion {
    type Error = AppError;

    fn try_from(row: AssertionRow) -> Result<Self, Self::Error> {
        let external_id = match (row.external_id, row.external_id_type) {
            (Some(value), Some(id_type)) => Some(ExternalId {
                value,
                id_type,
                url: row.external_id_url,
            }),
            _ => None,
        };

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            org_id: row.org_id,
            email: row.email,
            affiliation_section: row.affiliation_section.parse()?,
            role_title: row.role_title,
            department_name: row.department_name,
            start_date: join_date(row.start_year, row.start_month, row.start_day),
            end_date: join_date(row.end_year, row.end_month, row.end_day),
            organization: OrgDescriptor {
                name: row.org_name,
                city: row.org_city,
                country: row.org_country,
                region: row.org_region,
                disambiguated_org_id: row.disambiguated_org_id,
                disambiguation_source: row.disambiguation_source,
            },
            external_id,
            url: row.url,
            put_code: row.put_code,
            status: row.status.parse()?,
            last_sync_attempt: row.last_sync_attempt,
            created: row.created,
            modified: row.modified,
            last_modified_by: row.last_modified_by,
            updated: row.updated,
            added_to_registry: row.added_to_registry,
            updated_in_registry: row.updated_in_registry,
            deleted_from_registry: row.deleted_from_registry,
            orcid_error: row.orcid_error.as_deref().map(OrcidError::parse).transpose()?,
            notification_sent: row.notification_sent,
        })
    }
}

/// Bind every column of `row` in [`COLUMNS`] order.
fn bind_row(query: Query<'_, Postgres, PgArguments>, row: AssertionRow) -> Query<'_, Postgres, PgArguments> {
    query
        .bind(row.id)
        .bind(row.owner_id)
        .bind(row.org_id)
        .bind(row.email)
        .bind(row.affiliation_section)
        .bind(row.role_title)
        .bind(row.department_name)
        .bind(row.start_year)
        .bind(row.start_month)
        .bind(row.start_day)
        .bind(row.end_year)
        .bind(row.end_month)
        .bind(row.end_day)
        .bind(row.org_name)
        .bind(row.org_city)
        .bind(row.org_country)
        .bind(row.org_region)
        .bind(row.disambiguated_org_id)
        .bind(row.disambiguation_source)
        .bind(row.external_id)
        .bind(row.external_id_type)
        .bind(row.external_id_url)
        .bind(row.url)
        .bind(row.put_code)
        .bind(row.status)
        .bind(row.last_sync_attempt)
        .bind(row.created)
        .bind(row.modified)
        .bind(row.last_modified_by)
        .bind(row.updated)
        .bind(row.added_to_registry)
        .bind(row.updated_in_registry)
        .bind(row.deleted_from_registry)
        .bind(row.orcid_error)
        .bind(row.notification_sent)
}

fn into_assertions(rows: Vec<AssertionRow>) -> AppResult<Vec<Assertion>> {
    rows.into_iter().map(Assertion::try_from).collect()
}

/// Assertion storage in the `assertions` table.
#[derive(Debug, Clone)]
pub struct PgAssertionRepository {
    pool: PgPool,
}

impl PgAssertionRepository {
    /// Create a new repository over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, clause: &str, binds: &[&str]) -> AppResult<Vec<Assertion>> {
        let sql = format!("SELECT {COLUMNS} FROM assertions WHERE {clause} {ORDER}");
        let mut query = sqlx::query_as::<_, AssertionRow>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to query assertions", e))?;
        into_assertions(rows)
    }
}

#[async_trait]
impl AssertionRepository for PgAssertionRepository {
    async fn find_by_id(&self, id: AssertionId) -> AppResult<Option<Assertion>> {
        let sql = format!("SELECT {COLUMNS} FROM assertions WHERE id = $1");
        sqlx::query_as::<_, AssertionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find assertion", e))?
            .map(Assertion::try_from)
            .transpose()
    }

    async fn find_pending_create(&self) -> AppResult<Vec<Assertion>> {
        self.fetch_where(
            "(put_code IS NULL OR btrim(put_code) = '') \
             AND deleted_from_registry IS NULL AND status <> $1",
            &[AssertionStatus::UserDeletedFromOrcid.as_str()],
        )
        .await
    }

    async fn find_pending_update(&self) -> AppResult<Vec<Assertion>> {
        self.fetch_where(
            "updated AND put_code IS NOT NULL AND btrim(put_code) <> '' \
             AND deleted_from_registry IS NULL",
            &[],
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Vec<Assertion>> {
        self.fetch_where("email = $1", &[email]).await
    }

    async fn find_by_org(&self, org_id: &str) -> AppResult<Vec<Assertion>> {
        self.fetch_where("org_id = $1", &[org_id]).await
    }

    async fn find_by_org_and_status(
        &self,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<Assertion>> {
        self.fetch_where("org_id = $1 AND status = $2", &[org_id, status.as_str()])
            .await
    }

    async fn find_by_email_org_and_status(
        &self,
        email: &str,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<Assertion>> {
        self.fetch_where(
            "email = $1 AND org_id = $2 AND status = $3",
            &[email, org_id, status.as_str()],
        )
        .await
    }

    async fn find_distinct_emails_with_status(
        &self,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT email FROM assertions WHERE org_id = $1 AND status = $2 ORDER BY email",
        )
        .bind(org_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list affiliate emails", e))
    }

    async fn find_all(&self) -> AppResult<Vec<Assertion>> {
        self.fetch_where("TRUE", &[]).await
    }

    async fn insert(&self, assertion: &Assertion) -> AppResult<()> {
        let placeholders = (1..=35)
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO assertions ({COLUMNS}) VALUES ({placeholders})");
        let row = AssertionRow::try_from(assertion)?;
        bind_row(sqlx::query(&sql), row)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::conflict(
                    format!("Assertion {} already exists", assertion.id),
                ),
                _ => db_error("Failed to insert assertion", e),
            })?;
        Ok(())
    }

    async fn save(&self, assertion: &Assertion) -> AppResult<()> {
        let assignments = COLUMNS
            .split(',')
            .map(str::trim)
            .enumerate()
            .skip(1)
            .map(|(i, column)| format!("{column} = ${}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE assertions SET {assignments} WHERE id = $1");
        let row = AssertionRow::try_from(assertion)?;
        let result = bind_row(sqlx::query(&sql), row)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to save assertion", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Assertion {} not found",
                assertion.id
            )));
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: AssertionId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM assertions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete assertion", e))?;
        Ok(result.rows_affected() > 0)
    }
}
