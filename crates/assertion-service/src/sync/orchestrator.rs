//! Drives assertion create, update, and delete against the registry.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use assertion_core::error::AppError;
use assertion_core::types::AssertionId;
use assertion_database::repositories::AssertionRepository;
use assertion_entity::assertion::{Assertion, AssertionStatus, OrcidError};
use assertion_entity::identity::LinkedIdentityRecord;
use assertion_registry::{RegistryClient, RegistryError};

use super::report::{DeleteOutcome, EntryOutcome, SweepReport};
use crate::context::RequestContext;
use crate::identity::{KeyedLocks, LinkageService};
use crate::status::derive_status;

/// Registry credentials resolved for one affiliate at one organization.
struct Linked {
    record: LinkedIdentityRecord,
    orcid: String,
    id_token: String,
}

/// Pushes assertions to the registry and records the outcome on them.
///
/// Sweeps process candidates with at most `concurrency` in flight, in the
/// order the repository returns them. Each entry holds the
/// `(email, organization)` lock while it runs, and one entry's failure
/// never stops the sweep.
pub struct SyncOrchestrator {
    /// Assertion repository.
    assertions: Arc<dyn AssertionRepository>,
    /// Identity-linkage service.
    linkage: Arc<LinkageService>,
    /// Remote registry client.
    registry: Arc<dyn RegistryClient>,
    /// Per-affiliate locks shared with the other services.
    locks: Arc<KeyedLocks>,
    /// Maximum entries processed at once within a sweep.
    concurrency: usize,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl SyncOrchestrator {
    /// Creates a new orchestrator.
    pub fn new(
        assertions: Arc<dyn AssertionRepository>,
        linkage: Arc<LinkageService>,
        registry: Arc<dyn RegistryClient>,
        locks: Arc<KeyedLocks>,
        concurrency: usize,
    ) -> Self {
        Self {
            assertions,
            linkage,
            registry,
            locks,
            concurrency: concurrency.max(1),
        }
    }

    /// Create every pending assertion in the registry.
    pub async fn create_sweep(&self) -> Result<SweepReport, AppError> {
        let candidates = self.assertions.find_pending_create().await?;
        let outcomes: Vec<EntryOutcome> = stream::iter(candidates)
            .map(|candidate| async move {
                let id = candidate.id;
                let key = KeyedLocks::affiliate_key(&candidate.email, &candidate.org_id);
                match self.post_assertion(candidate).await {
                    Ok(outcome) => outcome,
                    Err(e) => self.isolate(id, &key, "create", &e).await,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = SweepReport::from_outcomes(outcomes);
        self.locks.prune();
        info!(
            candidates = report.candidates,
            synced = report.synced,
            not_ready = report.not_ready,
            failed = report.failed,
            "Create sweep finished"
        );
        Ok(report)
    }

    /// Push every edited assertion that already exists in the registry.
    pub async fn update_sweep(&self) -> Result<SweepReport, AppError> {
        let candidates = self.assertions.find_pending_update().await?;
        let outcomes: Vec<EntryOutcome> = stream::iter(candidates)
            .map(|candidate| async move {
                let id = candidate.id;
                let key = KeyedLocks::affiliate_key(&candidate.email, &candidate.org_id);
                match self.put_assertion(candidate).await {
                    Ok(outcome) => outcome,
                    Err(e) => self.isolate(id, &key, "update", &e).await,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = SweepReport::from_outcomes(outcomes);
        self.locks.prune();
        info!(
            candidates = report.candidates,
            synced = report.synced,
            not_ready = report.not_ready,
            failed = report.failed,
            "Update sweep finished"
        );
        Ok(report)
    }

    /// Create one assertion in the registry.
    ///
    /// The put-code is only stored if the assertion still has none when the
    /// registry answers, so a record is never assigned two put-codes.
    pub async fn post_assertion(&self, candidate: Assertion) -> Result<EntryOutcome, AppError> {
        let key = KeyedLocks::affiliate_key(&candidate.email, &candidate.org_id);
        let _guard = self.locks.lock(&key).await;

        let Some(assertion) = self.assertions.find_by_id(candidate.id).await? else {
            return Ok(EntryOutcome::Skipped);
        };
        if assertion.has_put_code() {
            return Ok(EntryOutcome::Skipped);
        }
        let Some(linked) = self.resolve_link(&assertion).await? else {
            return Ok(EntryOutcome::NotReady);
        };

        let result: Result<String, RegistryError> = async {
            let access_token = self.registry.exchange_token(&linked.id_token).await?;
            self.registry
                .create_affiliation(&linked.orcid, &access_token, &assertion)
                .await
        }
        .await;

        let put_code = match result {
            Ok(put_code) => put_code,
            Err(e) => return self.record_failure(assertion.id, "create", e).await,
        };

        let Some(mut current) = self.assertions.find_by_id(assertion.id).await? else {
            warn!(
                assertion_id = %assertion.id,
                put_code = %put_code,
                "Assertion deleted while it was being created in the registry"
            );
            return Ok(EntryOutcome::Skipped);
        };
        if current.has_put_code() {
            warn!(
                assertion_id = %assertion.id,
                put_code = %put_code,
                "Assertion already has a put-code; discarding the new one"
            );
            return Ok(EntryOutcome::Skipped);
        }

        let now = Utc::now();
        current.put_code = Some(put_code);
        current.added_to_registry = Some(now);
        current.updated_in_registry = Some(now);
        current.last_sync_attempt = Some(now);
        current.updated = false;
        current.orcid_error = None;
        current.status = derive_status(&current, &linked.record);
        self.assertions.save(&current).await?;

        info!(
            assertion_id = %current.id,
            status = %current.status,
            "Assertion created in registry"
        );
        Ok(EntryOutcome::Synced)
    }

    /// Push one edited assertion to the registry.
    pub async fn put_assertion(&self, candidate: Assertion) -> Result<EntryOutcome, AppError> {
        let key = KeyedLocks::affiliate_key(&candidate.email, &candidate.org_id);
        let _guard = self.locks.lock(&key).await;

        let Some(mut assertion) = self.assertions.find_by_id(candidate.id).await? else {
            return Ok(EntryOutcome::Skipped);
        };
        if !assertion.updated {
            return Ok(EntryOutcome::Skipped);
        }
        let Some(linked) = self.resolve_link(&assertion).await? else {
            return Ok(EntryOutcome::NotReady);
        };
        if !assertion.has_put_code() {
            error!(
                assertion_id = %assertion.id,
                "Cannot update an assertion without a put-code"
            );
            return Ok(EntryOutcome::Skipped);
        }

        let result: Result<(), RegistryError> = async {
            let access_token = self.registry.exchange_token(&linked.id_token).await?;
            self.registry
                .update_affiliation(&linked.orcid, &access_token, &assertion)
                .await
        }
        .await;

        if let Err(e) = result {
            return self.record_failure(assertion.id, "update", e).await;
        }

        let now = Utc::now();
        assertion.updated_in_registry = Some(now);
        assertion.last_sync_attempt = Some(now);
        assertion.updated = false;
        assertion.orcid_error = None;
        assertion.status = derive_status(&assertion, &linked.record);
        self.assertions.save(&assertion).await?;

        info!(
            assertion_id = %assertion.id,
            status = %assertion.status,
            "Assertion updated in registry"
        );
        Ok(EntryOutcome::Synced)
    }

    /// Remove an assertion from the registry on behalf of a portal user.
    ///
    /// Fails synchronously when the assertion does not exist, belongs to
    /// another organization, or was never created in the registry.
    pub async fn delete_assertion(
        &self,
        ctx: &RequestContext,
        id: AssertionId,
    ) -> Result<DeleteOutcome, AppError> {
        let candidate = self
            .assertions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Assertion {id} not found")))?;
        ctx.authorize(&candidate)?;

        let key = KeyedLocks::affiliate_key(&candidate.email, &candidate.org_id);
        let _guard = self.locks.lock(&key).await;

        let mut assertion = self
            .assertions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Assertion {id} not found")))?;
        if !assertion.has_put_code() {
            return Err(AppError::validation(format!(
                "Assertion {id} is not in the registry"
            )));
        }
        let Some(linked) = self.resolve_link(&assertion).await? else {
            return Ok(DeleteOutcome::NotReady);
        };

        let result: Result<bool, RegistryError> = async {
            let access_token = self.registry.exchange_token(&linked.id_token).await?;
            self.registry
                .delete_affiliation(&linked.orcid, &access_token, &assertion)
                .await
        }
        .await;

        match result {
            Ok(true) => {
                let now = Utc::now();
                assertion.deleted_from_registry = Some(now);
                assertion.modified = Some(now);
                assertion.last_sync_attempt = Some(now);
                assertion.orcid_error = None;
                assertion.status = derive_status(&assertion, &linked.record);
                self.assertions.save(&assertion).await?;
                info!(assertion_id = %id, login = %ctx.login, "Assertion deleted from registry");
                Ok(DeleteOutcome::Deleted)
            }
            Ok(false) => {
                warn!(assertion_id = %id, "Registry did not confirm the delete");
                Ok(DeleteOutcome::Failed)
            }
            Err(e) => {
                self.record_failure(id, "delete", e).await?;
                Ok(DeleteOutcome::Failed)
            }
        }
    }

    /// Persist a registry failure on an assertion and recompute its status.
    ///
    /// When the stored error means the affiliate revoked access, the
    /// organization's id token is deleted so no further calls are made
    /// until the affiliate links again. Returns the new status.
    pub async fn store_error(
        &self,
        id: AssertionId,
        error: OrcidError,
    ) -> Result<AssertionStatus, AppError> {
        let mut assertion = self
            .assertions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Assertion {id} not found")))?;
        let record = self.linkage.find_by_email(&assertion.email).await?.ok_or_else(|| {
            AppError::internal(format!("Assertion {id} has no identity record"))
        })?;

        assertion.orcid_error = Some(error);
        assertion.updated = false;
        assertion.last_sync_attempt = Some(Utc::now());
        assertion.status = derive_status(&assertion, &record);

        if assertion.status == AssertionStatus::UserRevokedAccess {
            self.linkage
                .delete_token(&assertion.email, &assertion.org_id)
                .await?;
        }
        self.assertions.save(&assertion).await?;
        Ok(assertion.status)
    }

    async fn record_failure(
        &self,
        id: AssertionId,
        action: &str,
        err: RegistryError,
    ) -> Result<EntryOutcome, AppError> {
        match &err {
            RegistryError::Api { status_code, .. } => {
                warn!(assertion_id = %id, action, status_code, "Registry rejected assertion");
            }
            other => {
                error!(assertion_id = %id, action, error = %other, "Registry call failed");
            }
        }
        let status = self.store_error(id, err.to_orcid_error()).await?;
        info!(assertion_id = %id, status = %status, "Registry error stored");
        Ok(EntryOutcome::Failed)
    }

    /// Resolve the affiliate's registry id and the organization's id token.
    ///
    /// `None` means the affiliate has not finished linking. A token that was
    /// deleted after a revocation looks the same.
    async fn resolve_link(&self, assertion: &Assertion) -> Result<Option<Linked>, AppError> {
        let Some(record) = self.linkage.find_by_email(&assertion.email).await? else {
            error!(email = %assertion.email, "Identity record not available");
            return Ok(None);
        };
        let Some(orcid) = record.orcid().map(str::to_string) else {
            warn!(email = %assertion.email, "Registry id still not available");
            return Ok(None);
        };
        let Some(id_token) = LinkageService::token_for(&record, &assertion.org_id) else {
            warn!(
                email = %assertion.email,
                org_id = %assertion.org_id,
                "Id token still not available"
            );
            return Ok(None);
        };
        Ok(Some(Linked {
            record,
            orcid,
            id_token,
        }))
    }

    /// Contain an entry failure that was not a registry response: store it
    /// as a code 0 error if possible and let the sweep move on.
    async fn isolate(&self, id: AssertionId, key: &str, action: &str, err: &AppError) -> EntryOutcome {
        error!(assertion_id = %id, action, error = %err, "Sweep entry failed");

        let _guard = self.locks.lock(key).await;
        if let Err(store_err) = self.store_error(id, OrcidError::transient(err.to_string())).await {
            warn!(assertion_id = %id, error = %store_err, "Could not store sweep entry failure");
        }
        EntryOutcome::Failed
    }
}
