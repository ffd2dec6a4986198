//! Identity-linkage service.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use assertion_core::error::AppError;
use assertion_database::repositories::IdentityRecordRepository;
use assertion_entity::identity::{LinkedIdentityRecord, RegistryToken};

use super::link::LinkSigner;
use super::lock::KeyedLocks;

/// Manages linked identity records and their per-organization token slots.
///
/// Every read-modify-write of a record runs under a per-email lock so that
/// concurrent slot changes for different organizations never overwrite
/// each other.
pub struct LinkageService {
    /// Identity record repository.
    identities: Arc<dyn IdentityRecordRepository>,
    /// Permission link signer.
    signer: Arc<LinkSigner>,
    /// Per-email record locks.
    record_locks: KeyedLocks,
}

impl std::fmt::Debug for LinkageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkageService")
            .field("signer", &self.signer)
            .finish()
    }
}

impl LinkageService {
    /// Creates a new linkage service.
    pub fn new(identities: Arc<dyn IdentityRecordRepository>, signer: Arc<LinkSigner>) -> Self {
        Self {
            identities,
            signer,
            record_locks: KeyedLocks::new(),
        }
    }

    /// Run `op` holding the lock for `email`, then drop idle locks.
    async fn with_record_lock<T, F, Fut>(&self, email: &str, op: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let guard = self.record_locks.lock(email).await;
        let result = op().await;
        drop(guard);
        self.record_locks.prune();
        result
    }

    async fn require(&self, email: &str) -> Result<LinkedIdentityRecord, AppError> {
        self.identities
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No identity record for {email}")))
    }

    /// Finds the record for an affiliate email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<LinkedIdentityRecord>, AppError> {
        self.identities.find_by_email(email).await
    }

    /// The usable id token `record` holds for `org_id`.
    pub fn token_for(record: &LinkedIdentityRecord, org_id: &str) -> Option<String> {
        record.token_for(org_id).map(str::to_string)
    }

    /// Make sure a record exists for `email` with a token slot for `org_id`.
    ///
    /// Idempotent; returns the record as stored afterwards.
    pub async fn ensure_token_slot(
        &self,
        email: &str,
        org_id: &str,
    ) -> Result<LinkedIdentityRecord, AppError> {
        self.with_record_lock(email, move || async move {
            let now = Utc::now();
            match self.identities.find_by_email(email).await? {
                None => {
                    let record = LinkedIdentityRecord::new(email, org_id, now);
                    self.identities.insert(&record).await?;
                    info!(email, org_id, "Identity record created");
                    Ok(record)
                }
                Some(record) if record.token_slot(org_id).is_some() => Ok(record),
                Some(mut record) => {
                    record.tokens.push(RegistryToken::slot(org_id));
                    record.modified = now;
                    self.identities.save(&record).await?;
                    info!(email, org_id, "Token slot added");
                    Ok(record)
                }
            }
        })
        .await
    }

    /// Forget the id token `email` granted to `org_id`.
    ///
    /// The slot itself is kept so the organization can ask again.
    pub async fn delete_token(&self, email: &str, org_id: &str) -> Result<(), AppError> {
        self.with_record_lock(email, move || async move {
            let Some(mut record) = self.identities.find_by_email(email).await? else {
                warn!(email, org_id, "No identity record to delete token from");
                return Ok(());
            };
            let Some(slot) = record.token_slot_mut(org_id) else {
                return Ok(());
            };
            if slot.token_id.take().is_none() {
                return Ok(());
            }
            record.modified = Utc::now();
            self.identities.save(&record).await?;
            info!(email, org_id, "Id token deleted");
            Ok(())
        })
        .await
    }

    /// Complete linking: store the affiliate's registry id and the id token
    /// granted to `org_id`, clearing any earlier revocation or denial.
    pub async fn store_registry_id_and_token(
        &self,
        email: &str,
        org_id: &str,
        orcid: &str,
        id_token: &str,
    ) -> Result<LinkedIdentityRecord, AppError> {
        self.with_record_lock(email, move || async move {
            let mut record = self.require(email).await?;
            record.orcid = Some(orcid.to_string());
            if record.token_slot(org_id).is_none() {
                record.tokens.push(RegistryToken::slot(org_id));
            }
            if let Some(slot) = record.token_slot_mut(org_id) {
                slot.token_id = Some(id_token.to_string());
                slot.revoked_date = None;
                slot.denied_date = None;
            }
            record.modified = Utc::now();
            self.identities.save(&record).await?;

            info!(email, org_id, "Registry id and token stored");
            Ok(record)
        })
        .await
    }

    /// Record that the affiliate declined `org_id`'s permission request.
    pub async fn store_denial(&self, email: &str, org_id: &str) -> Result<(), AppError> {
        self.with_record_lock(email, move || async move {
            let mut record = self.require(email).await?;
            let now = Utc::now();
            let slot = record.token_slot_mut(org_id).ok_or_else(|| {
                AppError::not_found(format!("No token slot for {email} at {org_id}"))
            })?;
            slot.denied_date = Some(now);
            record.modified = now;
            self.identities.save(&record).await?;

            info!(email, org_id, "Permission denied by affiliate");
            Ok(())
        })
        .await
    }

    /// Record that the affiliate withdrew `org_id`'s access.
    ///
    /// The id token is dropped with the revocation; linking again clears
    /// both.
    pub async fn store_revocation(&self, email: &str, org_id: &str) -> Result<(), AppError> {
        self.with_record_lock(email, move || async move {
            let mut record = self.require(email).await?;
            let now = Utc::now();
            let slot = record.token_slot_mut(org_id).ok_or_else(|| {
                AppError::not_found(format!("No token slot for {email} at {org_id}"))
            })?;
            slot.revoked_date = Some(now);
            slot.token_id = None;
            record.modified = now;
            self.identities.save(&record).await?;

            info!(email, org_id, "Access revoked by affiliate");
            Ok(())
        })
        .await
    }

    /// Move a record to a new email, keeping its registry id and tokens.
    pub async fn rename_email(&self, old_email: &str, new_email: &str) -> Result<(), AppError> {
        self.with_record_lock(old_email, move || async move {
            let mut record = self.require(old_email).await?;
            if self.identities.find_by_email(new_email).await?.is_some() {
                return Err(AppError::conflict(format!(
                    "An identity record for {new_email} already exists"
                )));
            }

            record.email = new_email.to_string();
            record.modified = Utc::now();
            self.identities.save(&record).await?;
            info!(old_email, new_email, "Identity record renamed");
            Ok(())
        })
        .await
    }

    /// Delete the record for an email. Returns `true` if it existed.
    pub async fn delete_by_email(&self, email: &str) -> Result<bool, AppError> {
        self.with_record_lock(email, move || async move {
            let deleted = self.identities.delete_by_email(email).await?;
            if deleted {
                info!(email, "Identity record deleted");
            }
            Ok(deleted)
        })
        .await
    }

    /// Permission link for `email` at `org_id`.
    pub fn generate_authorization_link(&self, email: &str, org_id: &str) -> Result<String, AppError> {
        self.signer.link(email, org_id, Utc::now())
    }

    /// The signer backing [`generate_authorization_link`](Self::generate_authorization_link).
    pub fn signer(&self) -> &LinkSigner {
        &self.signer
    }
}
