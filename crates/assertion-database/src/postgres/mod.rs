//! PostgreSQL repository backend.

mod assertion;
mod identity;
mod request;

pub use assertion::PgAssertionRepository;
pub use identity::PgIdentityRecordRepository;
pub use request::PgNotificationRequestRepository;

use assertion_core::error::{AppError, ErrorKind};

/// Wrap a sqlx error with the operation that failed.
fn db_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::Database, format!("{context}: {err}"), err)
}
