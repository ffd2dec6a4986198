//! Shared test helpers for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use assertion_core::config::RegistryConfig;
use assertion_core::error::AppError;
use assertion_core::result::AppResult;
use assertion_core::types::{AssertionId, UserId};
use assertion_database::memory::MemoryAssertionRepository;
use assertion_database::{AssertionRepository, Repositories};
use assertion_entity::assertion::{
    AffiliationSection, Assertion, AssertionDraft, AssertionStatus, FuzzyDate, OrgDescriptor,
};
use assertion_entity::identity::LinkedIdentityRecord;
use assertion_entity::notification::NotificationPermission;
use assertion_registry::{RegistryClient, RegistryError};
use assertion_service::{
    AssertionService, KeyedLocks, LinkSigner, LinkageService, NotificationDispatcher,
    RequestContext, SyncOrchestrator,
};

/// Organization most tests act for.
pub const ORG: &str = "001A";
/// A second organization for cross-organization checks.
pub const OTHER_ORG: &str = "002B";

/// How a scripted registry call fails.
#[derive(Debug, Clone)]
pub enum Failure {
    /// The registry answers with this status and body.
    Api(u16, &'static str),
    /// The call times out.
    Timeout,
}

impl Failure {
    fn to_error(&self) -> RegistryError {
        match self {
            Self::Api(status_code, error) => RegistryError::Api {
                status_code: *status_code,
                error: error.to_string(),
            },
            Self::Timeout => RegistryError::Timeout,
        }
    }
}

/// Registry client that records calls and fails on demand, keyed by the
/// affiliate's registry id.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    next_put_code: AtomicU64,
    create_delay: Mutex<Option<Duration>>,
    create_failures: Mutex<HashMap<String, Failure>>,
    update_failures: Mutex<HashMap<String, Failure>>,
    delete_failures: Mutex<HashMap<String, Failure>>,
    notification_failures: Mutex<HashMap<String, Failure>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    notifications: Mutex<Vec<(String, NotificationPermission)>>,
    known_emails: Mutex<HashMap<String, String>>,
}

impl FakeRegistry {
    pub fn fail_creates_for(&self, orcid: &str, failure: Failure) {
        self.create_failures
            .lock()
            .expect("lock")
            .insert(orcid.to_string(), failure);
    }

    pub fn fail_updates_for(&self, orcid: &str, failure: Failure) {
        self.update_failures
            .lock()
            .expect("lock")
            .insert(orcid.to_string(), failure);
    }

    pub fn fail_deletes_for(&self, orcid: &str, failure: Failure) {
        self.delete_failures
            .lock()
            .expect("lock")
            .insert(orcid.to_string(), failure);
    }

    /// Make the registry's email search find `orcid` for `email`.
    pub fn knows_email(&self, email: &str, orcid: &str) {
        self.known_emails
            .lock()
            .expect("lock")
            .insert(email.to_string(), orcid.to_string());
    }

    pub fn fail_notifications_for(&self, orcid: &str, failure: Failure) {
        self.notification_failures
            .lock()
            .expect("lock")
            .insert(orcid.to_string(), failure);
    }

    pub fn recover(&self) {
        self.create_failures.lock().expect("lock").clear();
        self.update_failures.lock().expect("lock").clear();
        self.delete_failures.lock().expect("lock").clear();
        self.notification_failures.lock().expect("lock").clear();
    }

    pub fn delay_creates(&self, delay: Duration) {
        *self.create_delay.lock().expect("lock") = Some(delay);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn sent_notifications(&self) -> Vec<(String, NotificationPermission)> {
        self.notifications.lock().expect("lock").clone()
    }

    fn scripted(failures: &Mutex<HashMap<String, Failure>>, orcid: &str) -> Result<(), RegistryError> {
        match failures.lock().expect("lock").get(orcid) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn exchange_token(&self, id_token: &str) -> Result<String, RegistryError> {
        Ok(format!("access-{id_token}"))
    }

    async fn create_affiliation(
        &self,
        orcid: &str,
        _access_token: &str,
        _assertion: &Assertion,
    ) -> Result<String, RegistryError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let delay = *self.create_delay.lock().expect("lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::scripted(&self.create_failures, orcid)?;
        Ok((1000 + self.next_put_code.fetch_add(1, Ordering::SeqCst)).to_string())
    }

    async fn update_affiliation(
        &self,
        orcid: &str,
        _access_token: &str,
        _assertion: &Assertion,
    ) -> Result<(), RegistryError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Self::scripted(&self.update_failures, orcid)
    }

    async fn delete_affiliation(
        &self,
        orcid: &str,
        _access_token: &str,
        _assertion: &Assertion,
    ) -> Result<bool, RegistryError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Self::scripted(&self.delete_failures, orcid)?;
        Ok(true)
    }

    async fn find_orcid_by_email(&self, email: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.known_emails.lock().expect("lock").get(email).cloned())
    }

    async fn post_notification(
        &self,
        orcid: &str,
        notification: &NotificationPermission,
    ) -> Result<(), RegistryError> {
        Self::scripted(&self.notification_failures, orcid)?;
        self.notifications
            .lock()
            .expect("lock")
            .push((orcid.to_string(), notification.clone()));
        Ok(())
    }
}

/// In-memory assertion storage that can fail saves and hold `find_all`
/// open on demand.
#[derive(Debug, Default)]
pub struct ScriptedAssertions {
    inner: MemoryAssertionRepository,
    failing_saves: Mutex<HashSet<AssertionId>>,
    pause_find_all: AtomicBool,
    find_all_taken: Notify,
    find_all_release: Notify,
}

impl ScriptedAssertions {
    /// The next save of `id` fails.
    pub fn fail_next_save(&self, id: AssertionId) {
        self.failing_saves.lock().expect("lock").insert(id);
    }

    /// The next `find_all` takes its snapshot, then waits for
    /// [`release_find_all`](Self::release_find_all) before returning it.
    pub fn pause_next_find_all(&self) {
        self.pause_find_all.store(true, Ordering::SeqCst);
    }

    /// Wait until a paused `find_all` has taken its snapshot.
    pub async fn find_all_taken(&self) {
        self.find_all_taken.notified().await;
    }

    pub fn release_find_all(&self) {
        self.find_all_release.notify_one();
    }
}

#[async_trait]
impl AssertionRepository for ScriptedAssertions {
    async fn find_by_id(&self, id: AssertionId) -> AppResult<Option<Assertion>> {
        self.inner.find_by_id(id).await
    }

    async fn find_pending_create(&self) -> AppResult<Vec<Assertion>> {
        self.inner.find_pending_create().await
    }

    async fn find_pending_update(&self) -> AppResult<Vec<Assertion>> {
        self.inner.find_pending_update().await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Vec<Assertion>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_org(&self, org_id: &str) -> AppResult<Vec<Assertion>> {
        self.inner.find_by_org(org_id).await
    }

    async fn find_by_org_and_status(
        &self,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<Assertion>> {
        self.inner.find_by_org_and_status(org_id, status).await
    }

    async fn find_by_email_org_and_status(
        &self,
        email: &str,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<Assertion>> {
        self.inner
            .find_by_email_org_and_status(email, org_id, status)
            .await
    }

    async fn find_distinct_emails_with_status(
        &self,
        org_id: &str,
        status: AssertionStatus,
    ) -> AppResult<Vec<String>> {
        self.inner
            .find_distinct_emails_with_status(org_id, status)
            .await
    }

    async fn find_all(&self) -> AppResult<Vec<Assertion>> {
        let snapshot = self.inner.find_all().await?;
        if self.pause_find_all.swap(false, Ordering::SeqCst) {
            self.find_all_taken.notify_one();
            self.find_all_release.notified().await;
        }
        Ok(snapshot)
    }

    async fn insert(&self, assertion: &Assertion) -> AppResult<()> {
        self.inner.insert(assertion).await
    }

    async fn save(&self, assertion: &Assertion) -> AppResult<()> {
        if self.failing_saves.lock().expect("lock").remove(&assertion.id) {
            return Err(AppError::internal("storage unavailable"));
        }
        self.inner.save(assertion).await
    }

    async fn delete_by_id(&self, id: AssertionId) -> AppResult<bool> {
        self.inner.delete_by_id(id).await
    }
}

/// Services wired over in-memory repositories and a [`FakeRegistry`].
pub struct TestApp {
    pub repos: Repositories,
    pub store: Arc<ScriptedAssertions>,
    pub registry: Arc<FakeRegistry>,
    pub linkage: Arc<LinkageService>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub assertions: Arc<AssertionService>,
}

impl TestApp {
    /// Create a new test application
    pub fn new() -> Self {
        let store = Arc::new(ScriptedAssertions::default());
        let mut repos = Repositories::memory();
        repos.assertions = store.clone();
        let registry = Arc::new(FakeRegistry::default());
        let registry_client: Arc<dyn RegistryClient> = registry.clone();
        let locks = Arc::new(KeyedLocks::new());

        let linkage = Arc::new(LinkageService::new(
            Arc::clone(&repos.identities),
            Arc::new(LinkSigner::new(&registry_config()).expect("signer")),
        ));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&repos.assertions),
            Arc::clone(&linkage),
            Arc::clone(&registry_client),
            Arc::clone(&locks),
            4,
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&repos.assertions),
            Arc::clone(&repos.requests),
            Arc::clone(&linkage),
            registry_client,
            Arc::clone(&locks),
        ));
        let assertions = Arc::new(AssertionService::new(
            Arc::clone(&repos.assertions),
            Arc::clone(&linkage),
            Arc::clone(&dispatcher),
            locks,
        ));

        Self {
            repos,
            store,
            registry,
            linkage,
            orchestrator,
            dispatcher,
            assertions,
        }
    }

    /// Create an assertion for `email` at `ctx`'s organization
    pub async fn create(&self, ctx: &RequestContext, email: &str) -> Assertion {
        self.assertions
            .create_assertion(ctx, draft(email))
            .await
            .expect("Failed to create assertion")
    }

    /// Complete linking of `email` for `org_id`
    pub async fn link(&self, email: &str, org_id: &str, orcid: &str) {
        self.linkage
            .store_registry_id_and_token(email, org_id, orcid, &format!("id-token-{orcid}"))
            .await
            .expect("Failed to link affiliate");
    }

    /// Current stored state of an assertion
    pub async fn reload(&self, id: AssertionId) -> Assertion {
        self.repos
            .assertions
            .find_by_id(id)
            .await
            .expect("Failed to load assertion")
            .expect("Assertion missing")
    }

    /// Current identity record of an affiliate
    pub async fn record(&self, email: &str) -> Option<LinkedIdentityRecord> {
        self.linkage
            .find_by_email(email)
            .await
            .expect("Failed to load identity record")
    }
}

/// Portal user acting for `org_id`
pub fn ctx(org_id: &str) -> RequestContext {
    RequestContext::new(UserId::new(), format!("admin@{org_id}.example"), org_id)
}

/// A valid employment draft for `email`
pub fn draft(email: &str) -> AssertionDraft {
    AssertionDraft {
        email: email.to_string(),
        affiliation_section: AffiliationSection::Employment,
        role_title: Some("Research Fellow".to_string()),
        department_name: Some("Physics".to_string()),
        start_date: Some(FuzzyDate::year("2021")),
        end_date: None,
        organization: OrgDescriptor {
            name: "Example University".to_string(),
            city: "Cambridge".to_string(),
            country: "GB".to_string(),
            region: None,
            disambiguated_org_id: Some("https://www.grid.ac/institutes/grid.5335.0".to_string()),
            disambiguation_source: Some("GRID".to_string()),
        },
        external_id: None,
        url: None,
    }
}

pub fn registry_config() -> RegistryConfig {
    RegistryConfig {
        api_base_url: "https://api.sandbox.orcid.org".to_string(),
        api_version: "v3.0".to_string(),
        token_endpoint: "https://sandbox.orcid.org/oauth/token".to_string(),
        client_id: "APP-TEST".to_string(),
        client_secret: "test-secret".to_string(),
        request_timeout_seconds: 5,
        landing_page_url: "https://portal.example/landing-page".to_string(),
        link_signing_secret: "test-signing-secret".to_string(),
        link_ttl_days: 90,
    }
}
