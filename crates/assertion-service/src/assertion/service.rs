//! Assertion lifecycle service for portal users and administrators.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use assertion_core::error::AppError;
use assertion_core::types::AssertionId;
use assertion_database::repositories::AssertionRepository;
use assertion_entity::assertion::{Assertion, AssertionDraft, AssertionStatus};
use assertion_entity::notification::NotificationBatchRequest;

use crate::context::RequestContext;
use crate::identity::{KeyedLocks, LinkageService};
use crate::notification::NotificationDispatcher;
use crate::status::derive_status;

/// Statuses the administrative override may set.
const OVERRIDABLE: [AssertionStatus; 4] = [
    AssertionStatus::Pending,
    AssertionStatus::NotificationRequested,
    AssertionStatus::NotificationSent,
    AssertionStatus::NotificationFailed,
];

/// A permission link for an affiliate who has not granted access yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionLink {
    /// Affiliate email.
    pub email: String,
    /// Signed landing page URL.
    pub link: String,
}

/// Creates, edits, and removes assertions, keeping their derived status
/// and the affiliates' identity records consistent.
pub struct AssertionService {
    /// Assertion repository.
    assertions: Arc<dyn AssertionRepository>,
    /// Identity-linkage service.
    linkage: Arc<LinkageService>,
    /// Notification dispatcher.
    dispatcher: Arc<NotificationDispatcher>,
    /// Per-affiliate locks shared with the sync path.
    locks: Arc<KeyedLocks>,
}

impl std::fmt::Debug for AssertionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionService").finish()
    }
}

impl AssertionService {
    /// Creates a new assertion service.
    pub fn new(
        assertions: Arc<dyn AssertionRepository>,
        linkage: Arc<LinkageService>,
        dispatcher: Arc<NotificationDispatcher>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            assertions,
            linkage,
            dispatcher,
            locks,
        }
    }

    /// Create an assertion for the caller's organization.
    pub async fn create_assertion(
        &self,
        ctx: &RequestContext,
        draft: AssertionDraft,
    ) -> Result<Assertion, AppError> {
        validate_draft(&draft)?;

        let org_id = ctx.effective_org().to_string();
        let mut assertion = Assertion::from_draft(draft, ctx.user_id, &org_id, Utc::now());
        assertion.last_modified_by = Some(ctx.login.clone());

        let key = KeyedLocks::affiliate_key(&assertion.email, &org_id);
        let _guard = self.locks.lock(&key).await;

        let record = self.linkage.ensure_token_slot(&assertion.email, &org_id).await?;
        assertion.status = derive_status(&assertion, &record);
        self.assertions.insert(&assertion).await?;

        info!(
            assertion_id = %assertion.id,
            org_id = %org_id,
            email = %assertion.email,
            "Assertion created"
        );
        Ok(assertion)
    }

    /// Create several assertions for the caller's organization.
    ///
    /// Drafts are validated up front so a bad row rejects the whole batch.
    pub async fn create_assertions(
        &self,
        ctx: &RequestContext,
        drafts: Vec<AssertionDraft>,
    ) -> Result<Vec<Assertion>, AppError> {
        for draft in &drafts {
            validate_draft(draft)?;
        }
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            created.push(self.create_assertion(ctx, draft).await?);
        }
        Ok(created)
    }

    /// Replace the member-editable fields of an assertion.
    pub async fn update_assertion(
        &self,
        ctx: &RequestContext,
        id: AssertionId,
        draft: AssertionDraft,
    ) -> Result<Assertion, AppError> {
        validate_draft(&draft)?;
        let existing = self.find_by_id(ctx, id).await?;

        let key = KeyedLocks::affiliate_key(&existing.email, &existing.org_id);
        let _guard = self.locks.lock(&key).await;

        let mut assertion = self.fetch(id).await?;
        let previous_email = assertion.email.clone();
        assertion.apply_draft(draft);
        assertion.updated = true;
        assertion.modified = Some(Utc::now());
        assertion.last_modified_by = Some(ctx.login.clone());

        let record = self
            .linkage
            .ensure_token_slot(&assertion.email, &assertion.org_id)
            .await?;
        assertion.status = derive_status(&assertion, &record);
        self.assertions.save(&assertion).await?;

        if previous_email != assertion.email {
            self.remove_orphaned_record(&previous_email).await?;
        }

        info!(assertion_id = %id, login = %ctx.login, "Assertion updated");
        Ok(assertion)
    }

    /// Find an assertion of the caller's organization.
    pub async fn find_by_id(
        &self,
        ctx: &RequestContext,
        id: AssertionId,
    ) -> Result<Assertion, AppError> {
        let assertion = self.fetch(id).await?;
        ctx.authorize(&assertion)?;
        Ok(assertion)
    }

    /// All assertions of the caller's organization.
    pub async fn find_by_org(&self, ctx: &RequestContext) -> Result<Vec<Assertion>, AppError> {
        self.assertions.find_by_org(ctx.effective_org()).await
    }

    /// Delete an assertion of the caller's organization, and the
    /// affiliate's identity record once nothing references it.
    pub async fn delete_by_id(&self, ctx: &RequestContext, id: AssertionId) -> Result<(), AppError> {
        let assertion = self.find_by_id(ctx, id).await?;

        let key = KeyedLocks::affiliate_key(&assertion.email, &assertion.org_id);
        let _guard = self.locks.lock(&key).await;

        self.assertions.delete_by_id(id).await?;
        self.remove_orphaned_record(&assertion.email).await?;

        info!(assertion_id = %id, login = %ctx.login, "Assertion deleted");
        Ok(())
    }

    /// Delete every assertion of an organization. Returns how many were
    /// deleted.
    pub async fn delete_all_by_org(&self, org_id: &str) -> Result<usize, AppError> {
        let assertions = self.assertions.find_by_org(org_id).await?;
        let mut deleted = 0;

        for assertion in assertions {
            let key = KeyedLocks::affiliate_key(&assertion.email, org_id);
            let _guard = self.locks.lock(&key).await;
            if self.assertions.delete_by_id(assertion.id).await? {
                deleted += 1;
            }
            self.remove_orphaned_record(&assertion.email).await?;
        }

        info!(org_id, deleted, "Organization assertions deleted");
        Ok(deleted)
    }

    /// Move every assertion of `org_id` to `new_org_id`.
    ///
    /// Moved assertions are marked edited so the next update sweep pushes
    /// them again. Returns how many were moved.
    pub async fn reparent_org(&self, org_id: &str, new_org_id: &str) -> Result<usize, AppError> {
        let assertions = self.assertions.find_by_org(org_id).await?;
        let count = assertions.len();
        let now = Utc::now();

        for mut assertion in assertions {
            let key = KeyedLocks::affiliate_key(&assertion.email, org_id);
            let _guard = self.locks.lock(&key).await;

            let record = self
                .linkage
                .ensure_token_slot(&assertion.email, new_org_id)
                .await?;
            assertion.org_id = new_org_id.to_string();
            assertion.updated = true;
            assertion.modified = Some(now);
            assertion.status = derive_status(&assertion, &record);
            self.assertions.save(&assertion).await?;
        }

        info!(org_id, new_org_id, count, "Organization assertions re-parented");
        Ok(count)
    }

    /// Rewrite any stored status that no longer matches its derivation.
    ///
    /// Notification statuses are left alone; derivation never produces
    /// them. Each assertion is re-read under its affiliate lock before it
    /// is rewritten. Returns how many assertions changed.
    pub async fn status_cleanup(&self) -> Result<usize, AppError> {
        let mut cleaned = 0;

        for candidate in self.assertions.find_all().await? {
            let key = KeyedLocks::affiliate_key(&candidate.email, &candidate.org_id);
            let _guard = self.locks.lock(&key).await;

            let Some(mut assertion) = self.assertions.find_by_id(candidate.id).await? else {
                continue;
            };
            if assertion.status.is_notification() {
                continue;
            }
            let Some(record) = self.linkage.find_by_email(&assertion.email).await? else {
                warn!(
                    assertion_id = %assertion.id,
                    email = %assertion.email,
                    "Assertion has no identity record"
                );
                continue;
            };
            let status = derive_status(&assertion, &record);
            if status != assertion.status {
                assertion.status = status;
                self.assertions.save(&assertion).await?;
                cleaned += 1;
            }
        }

        self.locks.prune();
        info!(cleaned, "Assertion status cleanup finished");
        Ok(cleaned)
    }

    /// Administrative status override.
    ///
    /// Only the pending and notification statuses can be set; everything
    /// else is derived.
    pub async fn update_assertion_status(
        &self,
        id: AssertionId,
        status: AssertionStatus,
    ) -> Result<Assertion, AppError> {
        if !OVERRIDABLE.contains(&status) {
            return Err(AppError::validation(format!(
                "Status {status} cannot be set directly"
            )));
        }
        let mut assertion = self.fetch(id).await?;
        assertion.status = status;
        self.assertions.save(&assertion).await?;
        Ok(assertion)
    }

    /// Queue the organization's pending assertions for a permission
    /// notification batch and open the batch request.
    pub async fn request_notifications(
        &self,
        ctx: &RequestContext,
    ) -> Result<NotificationBatchRequest, AppError> {
        let org_id = ctx.effective_org();
        if self.dispatcher.request_in_progress(org_id).await? {
            return Err(AppError::conflict(format!(
                "A notification request is already active for organization {org_id}"
            )));
        }

        let pending = self
            .assertions
            .find_by_org_and_status(org_id, AssertionStatus::Pending)
            .await?;
        let queued = pending.len();
        for assertion in pending {
            let key = KeyedLocks::affiliate_key(&assertion.email, org_id);
            let _guard = self.locks.lock(&key).await;
            self.update_assertion_status(assertion.id, AssertionStatus::NotificationRequested)
                .await?;
        }

        let request = self.dispatcher.create_request(ctx).await?;
        info!(org_id, queued, "Assertions queued for notification");
        Ok(request)
    }

    /// Permission links for the caller's organization's affiliates who have
    /// not granted access yet.
    pub async fn permission_links(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<PermissionLink>, AppError> {
        let org_id = ctx.effective_org();
        let mut emails: Vec<String> = self
            .assertions
            .find_by_org(org_id)
            .await?
            .into_iter()
            .map(|a| a.email)
            .collect();
        emails.sort();
        emails.dedup();

        let mut links = Vec::new();
        for email in emails {
            let linked = self
                .linkage
                .find_by_email(&email)
                .await?
                .is_some_and(|record| record.token_for(org_id).is_some());
            if !linked {
                let link = self.linkage.generate_authorization_link(&email, org_id)?;
                links.push(PermissionLink { email, link });
            }
        }
        Ok(links)
    }

    async fn fetch(&self, id: AssertionId) -> Result<Assertion, AppError> {
        self.assertions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Assertion {id} not found")))
    }

    async fn remove_orphaned_record(&self, email: &str) -> Result<(), AppError> {
        if self.assertions.find_by_email(email).await?.is_empty() {
            self.linkage.delete_by_email(email).await?;
        }
        Ok(())
    }
}

fn validate_draft(draft: &AssertionDraft) -> Result<(), AppError> {
    let email = draft.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation(format!(
            "Invalid affiliate email '{}'",
            draft.email
        )));
    }
    if draft.organization.name.trim().is_empty() {
        return Err(AppError::validation("Organization name is required"));
    }
    if draft.organization.city.trim().is_empty() || draft.organization.country.trim().is_empty() {
        return Err(AppError::validation("Organization city and country are required"));
    }
    Ok(())
}
