//! Notification batch dispatcher.
//!
//! An organization asks for its unlinked affiliates to be notified by
//! creating a batch request. The send pass picks up every active request,
//! sends one aggregated permission notification per affiliate, and marks
//! the request completed whatever the per-affiliate outcome was.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use assertion_core::error::AppError;
use assertion_database::repositories::{AssertionRepository, NotificationRequestRepository};
use assertion_entity::assertion::{Assertion, AssertionStatus};
use assertion_entity::notification::NotificationBatchRequest;
use assertion_registry::RegistryClient;

use super::permission::build_permission_notification;
use crate::context::RequestContext;
use crate::identity::{KeyedLocks, LinkageService};

/// Per-affiliate result of a send pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AffiliateOutcome {
    Sent,
    Reverted,
    Failed,
    Empty,
}

/// Counts for one send pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendReport {
    /// Requests completed.
    pub requests: usize,
    /// Affiliates notified.
    pub sent: usize,
    /// Affiliates the registry does not know, reverted to pending.
    pub reverted: usize,
    /// Affiliates whose notification failed.
    pub failed: usize,
}

impl SendReport {
    fn record(&mut self, outcome: AffiliateOutcome) {
        match outcome {
            AffiliateOutcome::Sent => self.sent += 1,
            AffiliateOutcome::Reverted => self.reverted += 1,
            AffiliateOutcome::Failed => self.failed += 1,
            AffiliateOutcome::Empty => {}
        }
    }
}

/// Creates notification batch requests and runs the send pass.
pub struct NotificationDispatcher {
    /// Assertion repository.
    assertions: Arc<dyn AssertionRepository>,
    /// Batch request repository.
    requests: Arc<dyn NotificationRequestRepository>,
    /// Identity-linkage service.
    linkage: Arc<LinkageService>,
    /// Remote registry client.
    registry: Arc<dyn RegistryClient>,
    /// Per-affiliate locks shared with the sync path.
    locks: Arc<KeyedLocks>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish()
    }
}

impl NotificationDispatcher {
    /// Creates a new dispatcher.
    pub fn new(
        assertions: Arc<dyn AssertionRepository>,
        requests: Arc<dyn NotificationRequestRepository>,
        linkage: Arc<LinkageService>,
        registry: Arc<dyn RegistryClient>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            assertions,
            requests,
            linkage,
            registry,
            locks,
        }
    }

    /// Whether the organization has a request waiting for the send pass.
    pub async fn request_in_progress(&self, org_id: &str) -> Result<bool, AppError> {
        Ok(self.requests.find_active_by_org(org_id).await?.is_some())
    }

    /// Open a batch request for the caller's organization.
    ///
    /// Fails with a conflict while another request of the organization is
    /// still active. The insert itself is atomic, so two concurrent calls
    /// cannot both succeed.
    pub async fn create_request(
        &self,
        ctx: &RequestContext,
    ) -> Result<NotificationBatchRequest, AppError> {
        let org_id = ctx.effective_org();
        if self.request_in_progress(org_id).await? {
            return Err(active_request_conflict(org_id));
        }

        let request = NotificationBatchRequest::new(&ctx.login, org_id, Utc::now());
        if !self.requests.insert_if_none_active(&request).await? {
            return Err(active_request_conflict(org_id));
        }

        info!(
            request_id = %request.id,
            org_id,
            requested_by = %ctx.login,
            "Notification request created"
        );
        Ok(request)
    }

    /// Process every active request to completion.
    pub async fn send_pass(&self) -> Result<SendReport, AppError> {
        let mut report = SendReport::default();

        for mut request in self.requests.find_active().await? {
            if let Err(e) = self.process_request(&request, &mut report).await {
                error!(
                    request_id = %request.id,
                    org_id = %request.org_id,
                    error = %e,
                    "Notification request processing failed"
                );
            }

            request.date_completed = Some(Utc::now());
            self.requests.save(&request).await?;
            report.requests += 1;
            info!(
                request_id = %request.id,
                org_id = %request.org_id,
                requested_by = %request.requested_by,
                "Notification request completed"
            );
        }

        self.locks.prune();
        Ok(report)
    }

    async fn process_request(
        &self,
        request: &NotificationBatchRequest,
        report: &mut SendReport,
    ) -> Result<(), AppError> {
        let emails = self
            .assertions
            .find_distinct_emails_with_status(&request.org_id, AssertionStatus::NotificationRequested)
            .await?;

        for email in emails {
            let outcome = match self.notify_affiliate(&email, &request.org_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        email = %email,
                        org_id = %request.org_id,
                        error = %e,
                        "Affiliate notification failed"
                    );
                    AffiliateOutcome::Failed
                }
            };
            report.record(outcome);
        }
        Ok(())
    }

    async fn notify_affiliate(&self, email: &str, org_id: &str) -> Result<AffiliateOutcome, AppError> {
        let key = KeyedLocks::affiliate_key(email, org_id);
        let _guard = self.locks.lock(&key).await;

        let pending = self
            .assertions
            .find_by_email_org_and_status(email, org_id, AssertionStatus::NotificationRequested)
            .await?;
        if pending.is_empty() {
            return Ok(AffiliateOutcome::Empty);
        }

        let orcid = match self.resolve_orcid(email).await {
            Ok(orcid) => orcid,
            Err(e) => {
                warn!(email, org_id, error = %e, "Registry id lookup failed");
                self.set_status(pending, AssertionStatus::NotificationFailed)
                    .await?;
                return Ok(AffiliateOutcome::Failed);
            }
        };
        let Some(orcid) = orcid else {
            info!(email, org_id, "Affiliate has no registry record; reverting to pending");
            self.set_status(pending, AssertionStatus::Pending).await?;
            return Ok(AffiliateOutcome::Reverted);
        };

        match self.send(email, org_id, &orcid, &pending).await {
            Ok(()) => {
                let now = Utc::now();
                for mut assertion in pending {
                    assertion.status = AssertionStatus::NotificationSent;
                    assertion.notification_sent = Some(now);
                    self.assertions.save(&assertion).await?;
                }
                info!(email, org_id, "Permission notification sent");
                Ok(AffiliateOutcome::Sent)
            }
            Err(e) => {
                warn!(email, org_id, error = %e, "Error sending permission notification");
                self.set_status(pending, AssertionStatus::NotificationFailed)
                    .await?;
                Ok(AffiliateOutcome::Failed)
            }
        }
    }

    /// Registry id of the affiliate: the one stored at linking time, or
    /// else whatever the registry has on file for the email.
    async fn resolve_orcid(&self, email: &str) -> Result<Option<String>, AppError> {
        let stored = self
            .linkage
            .find_by_email(email)
            .await?
            .and_then(|record| record.orcid().map(str::to_string));
        if stored.is_some() {
            return Ok(stored);
        }
        self.registry
            .find_orcid_by_email(email)
            .await
            .map_err(|e| AppError::external_service(format!("Registry id lookup failed: {e}")))
    }

    async fn send(
        &self,
        email: &str,
        org_id: &str,
        orcid: &str,
        pending: &[Assertion],
    ) -> Result<(), AppError> {
        let link = self.linkage.generate_authorization_link(email, org_id)?;
        let notification = build_permission_notification(pending, link)?;
        self.registry
            .post_notification(orcid, &notification)
            .await
            .map_err(|e| AppError::external_service(format!("Notification rejected: {e}")))
    }

    async fn set_status(
        &self,
        assertions: Vec<Assertion>,
        status: AssertionStatus,
    ) -> Result<(), AppError> {
        for mut assertion in assertions {
            assertion.status = status;
            self.assertions.save(&assertion).await?;
        }
        Ok(())
    }
}

fn active_request_conflict(org_id: &str) -> AppError {
    AppError::conflict(format!(
        "A notification request is already active for organization {org_id}"
    ))
}
