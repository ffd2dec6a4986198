//! Integration tests for the create and update sweeps and explicit deletes.

use std::time::Duration;

use assertion_core::error::ErrorKind;
use assertion_entity::assertion::AssertionStatus;
use assertion_service::DeleteOutcome;
use assertion_service::sync::EntryOutcome;

use crate::helpers::{Failure, ORG, OTHER_ORG, TestApp, ctx, draft};

const ORCID: &str = "0000-0002-1825-0097";

#[tokio::test]
async fn test_create_sweep_waits_for_linking() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;
    assert_eq!(assertion.status, AssertionStatus::Pending);

    for _ in 0..2 {
        let report = app.orchestrator.create_sweep().await.expect("sweep");
        assert_eq!(report.not_ready, 1);
    }
    assert_eq!(app.registry.creates(), 0);
    assert_eq!(app.reload(assertion.id).await.status, AssertionStatus::Pending);
    assert!(app.reload(assertion.id).await.last_sync_attempt.is_none());

    app.link("ada@example.org", ORG, ORCID).await;
    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.synced, 1);

    let synced = app.reload(assertion.id).await;
    assert_eq!(synced.status, AssertionStatus::InOrcid);
    assert_eq!(synced.put_code(), Some("1000"));
    assert!(synced.added_to_registry.is_some());
    assert!(!synced.updated);

    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.candidates, 0);
    assert_eq!(app.registry.creates(), 1);
}

#[tokio::test]
async fn test_concurrent_posts_assign_one_put_code() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.registry.delay_creates(Duration::from_millis(20));

    let (first, second) = tokio::join!(
        app.orchestrator.post_assertion(assertion.clone()),
        app.orchestrator.post_assertion(assertion.clone()),
    );
    let mut outcomes = vec![first.expect("first"), second.expect("second")];
    outcomes.sort_by_key(|outcome| *outcome != EntryOutcome::Synced);

    assert_eq!(outcomes, [EntryOutcome::Synced, EntryOutcome::Skipped]);
    assert_eq!(app.registry.creates(), 1);
    assert_eq!(app.reload(assertion.id).await.put_code(), Some("1000"));
}

#[tokio::test]
async fn test_unauthorized_marks_revoked_and_drops_token() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.registry
        .fail_creates_for(ORCID, Failure::Api(401, r#"{"error":"invalid_token"}"#));

    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.failed, 1);

    let failed = app.reload(assertion.id).await;
    assert_eq!(failed.status, AssertionStatus::UserRevokedAccess);
    assert_eq!(failed.orcid_error.as_ref().map(|e| e.status_code), Some(401));
    assert!(failed.last_sync_attempt.is_some());

    let record = app.record("ada@example.org").await.expect("record");
    assert!(record.token_for(ORG).is_none());
    assert!(record.token_slot(ORG).is_some());

    app.registry.recover();
    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.not_ready, 1);
    assert_eq!(app.registry.creates(), 1);
}

#[tokio::test]
async fn test_invalid_scope_is_treated_as_revocation() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.registry.fail_creates_for(
        ORCID,
        Failure::Api(400, r#"{"error":"invalid_scope","error_description":"Invalid scope"}"#),
    );

    app.orchestrator.create_sweep().await.expect("sweep");

    assert_eq!(
        app.reload(assertion.id).await.status,
        AssertionStatus::UserRevokedAccess
    );
}

#[tokio::test]
async fn test_timeout_is_stored_as_code_zero_and_retried() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.registry.fail_creates_for(ORCID, Failure::Timeout);

    app.orchestrator.create_sweep().await.expect("sweep");
    let failed = app.reload(assertion.id).await;
    assert_eq!(failed.status, AssertionStatus::ErrorAddingToOrcid);
    assert_eq!(failed.orcid_error.as_ref().map(|e| e.status_code), Some(0));

    app.registry.recover();
    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.synced, 1);

    let synced = app.reload(assertion.id).await;
    assert_eq!(synced.status, AssertionStatus::InOrcid);
    assert!(synced.orcid_error.is_none());
}

#[tokio::test]
async fn test_one_failing_entry_does_not_stop_the_sweep() {
    let app = TestApp::new();
    let failing = app.create(&ctx(ORG), "ada@example.org").await;
    let healthy = app.create(&ctx(ORG), "grace@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.link("grace@example.org", ORG, "0000-0001-5109-3700").await;
    app.registry
        .fail_creates_for(ORCID, Failure::Api(500, "Internal Server Error"));

    let report = app.orchestrator.create_sweep().await.expect("sweep");

    assert_eq!((report.candidates, report.synced, report.failed), (2, 1, 1));
    assert_eq!(
        app.reload(failing.id).await.status,
        AssertionStatus::ErrorAddingToOrcid
    );
    assert_eq!(app.reload(healthy.id).await.status, AssertionStatus::InOrcid);
}

#[tokio::test]
async fn test_update_sweep_pushes_edits() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let assertion = app.create(&portal, "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.orchestrator.create_sweep().await.expect("create sweep");

    let mut edit = draft("ada@example.org");
    edit.role_title = Some("Senior Research Fellow".to_string());
    let edited = app
        .assertions
        .update_assertion(&portal, assertion.id, edit)
        .await
        .expect("update");
    assert!(edited.updated);
    assert_eq!(edited.status, AssertionStatus::PendingRetry);

    let report = app.orchestrator.update_sweep().await.expect("update sweep");
    assert_eq!(report.synced, 1);
    assert_eq!(app.registry.updates(), 1);

    let synced = app.reload(assertion.id).await;
    assert_eq!(synced.status, AssertionStatus::InOrcid);
    assert!(!synced.updated);
    assert!(synced.updated_in_registry.is_some());

    let report = app.orchestrator.update_sweep().await.expect("update sweep");
    assert_eq!(report.candidates, 0);
}

#[tokio::test]
async fn test_update_failure_keeps_put_code() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let assertion = app.create(&portal, "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.orchestrator.create_sweep().await.expect("create sweep");
    app.assertions
        .update_assertion(&portal, assertion.id, draft("ada@example.org"))
        .await
        .expect("update");
    app.registry
        .fail_updates_for(ORCID, Failure::Api(409, "Conflict"));

    let report = app.orchestrator.update_sweep().await.expect("update sweep");
    assert_eq!(report.failed, 1);

    let failed = app.reload(assertion.id).await;
    assert_eq!(failed.status, AssertionStatus::ErrorUpdatingToOrcid);
    assert_eq!(failed.put_code(), Some("1000"));
    assert!(!failed.updated);
}

#[tokio::test]
async fn test_delete_removes_affiliation_from_registry() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let assertion = app.create(&portal, "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.orchestrator.create_sweep().await.expect("create sweep");

    let err = app
        .orchestrator
        .delete_assertion(&ctx(OTHER_ORG), assertion.id)
        .await
        .expect_err("other organization");
    assert!(err.is(ErrorKind::Authorization));
    assert_eq!(app.registry.deletes(), 0);

    let outcome = app
        .orchestrator
        .delete_assertion(&portal, assertion.id)
        .await
        .expect("delete");
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(app.registry.deletes(), 1);

    let deleted = app.reload(assertion.id).await;
    assert_eq!(deleted.status, AssertionStatus::DeletedInOrcid);
    assert!(deleted.deleted_from_registry.is_some());

    let report = app.orchestrator.create_sweep().await.expect("create sweep");
    assert_eq!(report.candidates, 0);
}

#[tokio::test]
async fn test_delete_requires_registry_item() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let assertion = app.create(&portal, "ada@example.org").await;

    let err = app
        .orchestrator
        .delete_assertion(&portal, assertion.id)
        .await
        .expect_err("never created");
    assert!(err.is(ErrorKind::Validation));
}

#[tokio::test]
async fn test_delete_waits_for_token() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let assertion = app.create(&portal, "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.orchestrator.create_sweep().await.expect("create sweep");
    app.linkage
        .delete_token("ada@example.org", ORG)
        .await
        .expect("delete token");

    let outcome = app
        .orchestrator
        .delete_assertion(&portal, assertion.id)
        .await
        .expect("delete");

    assert_eq!(outcome, DeleteOutcome::NotReady);
    assert_eq!(app.registry.deletes(), 0);
    let kept = app.reload(assertion.id).await;
    assert!(kept.deleted_from_registry.is_none());
    assert_eq!(kept.put_code(), Some("1000"));
}

#[tokio::test]
async fn test_delete_rejected_by_registry_is_stored() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let assertion = app.create(&portal, "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.orchestrator.create_sweep().await.expect("create sweep");
    app.registry
        .fail_deletes_for(ORCID, Failure::Api(401, r#"{"error":"invalid_token"}"#));

    let outcome = app
        .orchestrator
        .delete_assertion(&portal, assertion.id)
        .await
        .expect("delete");

    assert_eq!(outcome, DeleteOutcome::Failed);
    let failed = app.reload(assertion.id).await;
    assert_eq!(failed.orcid_error.as_ref().map(|e| e.status_code), Some(401));
    assert_eq!(failed.status, AssertionStatus::UserRevokedAccess);
    assert!(failed.deleted_from_registry.is_none());

    let record = app.record("ada@example.org").await.expect("record");
    assert!(record.token_for(ORG).is_none());
}

#[tokio::test]
async fn test_revoked_affiliate_is_not_ready() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.linkage
        .store_revocation("ada@example.org", ORG)
        .await
        .expect("revoke");

    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.not_ready, 1);
    assert_eq!(app.registry.creates(), 0);

    assert_eq!(app.assertions.status_cleanup().await.expect("cleanup"), 1);
    assert_eq!(
        app.reload(assertion.id).await.status,
        AssertionStatus::UserRevokedAccess
    );

    app.link("ada@example.org", ORG, ORCID).await;
    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.synced, 1);
}

#[tokio::test]
async fn test_storage_failure_is_stored_as_code_zero() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;
    app.link("ada@example.org", ORG, ORCID).await;
    app.store.fail_next_save(assertion.id);

    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.failed, 1);

    let failed = app.reload(assertion.id).await;
    let error = failed.orcid_error.as_ref().expect("stored error");
    assert_eq!(error.status_code, 0);
    assert!(error.error.contains("storage unavailable"));
    assert_eq!(failed.status, AssertionStatus::ErrorAddingToOrcid);
    assert!(failed.put_code().is_none());
}
