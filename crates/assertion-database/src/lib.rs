//! # assertion-database
//!
//! Persistence for assertions, linked identity records, and notification
//! batch requests. The service layer only sees the traits in
//! [`repositories`]; two backends implement them:
//!
//! - [`postgres`]: sqlx over a PostgreSQL pool, schema in `migrations/`
//! - [`memory`]: process-local maps, used by tests and local runs

pub mod connection;
pub mod memory;
pub mod migration;
pub mod postgres;
pub mod repositories;

use std::sync::Arc;

use sqlx::PgPool;

pub use repositories::{AssertionRepository, IdentityRecordRepository, NotificationRequestRepository};

/// The full set of repositories handed to the service layer.
#[derive(Clone)]
pub struct Repositories {
    /// Assertion storage.
    pub assertions: Arc<dyn AssertionRepository>,
    /// Linked identity record storage.
    pub identities: Arc<dyn IdentityRecordRepository>,
    /// Notification batch request storage.
    pub requests: Arc<dyn NotificationRequestRepository>,
}

impl Repositories {
    /// Repositories backed by a PostgreSQL pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            assertions: Arc::new(postgres::PgAssertionRepository::new(pool.clone())),
            identities: Arc::new(postgres::PgIdentityRecordRepository::new(pool.clone())),
            requests: Arc::new(postgres::PgNotificationRequestRepository::new(pool)),
        }
    }

    /// Empty in-memory repositories.
    pub fn memory() -> Self {
        Self {
            assertions: Arc::new(memory::MemoryAssertionRepository::new()),
            identities: Arc::new(memory::MemoryIdentityRecordRepository::new()),
            requests: Arc::new(memory::MemoryNotificationRequestRepository::new()),
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish()
    }
}
