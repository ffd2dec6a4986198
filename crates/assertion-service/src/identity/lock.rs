//! Keyed async mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A set of async mutexes created on demand per key.
///
/// Sync and notification passes hold the lock for an
/// `(email, organization)` pair while they read and write that
/// affiliate's assertions and token slot.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    /// Creates an empty lock set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock key for one affiliate at one organization.
    pub fn affiliate_key(email: &str, org_id: &str) -> String {
        format!("{}|{}", email.trim(), org_id.trim())
    }

    /// Wait for and take the lock for `key`.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        mutex.lock_owned().await
    }

    /// Drop mutexes nobody holds or waits for.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
