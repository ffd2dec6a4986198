//! Integration tests for the assertion lifecycle service.

use std::sync::Arc;

use assertion_core::error::ErrorKind;
use assertion_entity::assertion::AssertionStatus;

use crate::helpers::{ORG, OTHER_ORG, TestApp, ctx, draft};

#[tokio::test]
async fn test_create_ensures_token_slot() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;

    assert_eq!(assertion.org_id, ORG);
    assert_eq!(assertion.last_modified_by.as_deref(), Some("admin@001A.example"));

    let record = app.record("ada@example.org").await.expect("record");
    assert!(record.token_slot(ORG).is_some());
    assert!(record.token_for(ORG).is_none());
}

#[tokio::test]
async fn test_invalid_draft_is_rejected() {
    let app = TestApp::new();
    let mut bad = draft("not-an-email");
    bad.organization.city = String::new();

    let err = app
        .assertions
        .create_assertions(&ctx(ORG), vec![draft("ada@example.org"), bad])
        .await
        .expect_err("invalid");
    assert!(err.is(ErrorKind::Validation));
    assert!(app.record("ada@example.org").await.is_none());
}

#[tokio::test]
async fn test_cross_organization_access_is_rejected() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;

    let err = app
        .assertions
        .find_by_id(&ctx(OTHER_ORG), assertion.id)
        .await
        .expect_err("other organization");
    assert!(err.is(ErrorKind::Authorization));

    let delegated = ctx(OTHER_ORG).login_as(ORG);
    let found = app
        .assertions
        .find_by_id(&delegated, assertion.id)
        .await
        .expect("login as");
    assert_eq!(found.id, assertion.id);
}

#[tokio::test]
async fn test_email_change_moves_identity_record() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let assertion = app.create(&portal, "ada@example.org").await;

    app.assertions
        .update_assertion(&portal, assertion.id, draft("ada.lovelace@example.org"))
        .await
        .expect("update");

    assert!(app.record("ada@example.org").await.is_none());
    let record = app.record("ada.lovelace@example.org").await.expect("record");
    assert!(record.token_slot(ORG).is_some());
}

#[tokio::test]
async fn test_delete_keeps_record_while_referenced() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let first = app.create(&portal, "ada@example.org").await;
    let second = app.create(&portal, "ada@example.org").await;

    app.assertions.delete_by_id(&portal, first.id).await.expect("delete");
    assert!(app.record("ada@example.org").await.is_some());

    app.assertions.delete_by_id(&portal, second.id).await.expect("delete");
    assert!(app.record("ada@example.org").await.is_none());
}

#[tokio::test]
async fn test_delete_all_by_org_leaves_other_orgs() {
    let app = TestApp::new();
    app.create(&ctx(ORG), "ada@example.org").await;
    app.create(&ctx(ORG), "grace@example.org").await;
    let kept = app.create(&ctx(OTHER_ORG), "ada@example.org").await;

    let deleted = app.assertions.delete_all_by_org(ORG).await.expect("delete all");

    assert_eq!(deleted, 2);
    assert!(app.record("grace@example.org").await.is_none());
    assert!(app.record("ada@example.org").await.is_some());
    assert_eq!(app.reload(kept.id).await.org_id, OTHER_ORG);
}

#[tokio::test]
async fn test_reparent_marks_assertions_for_update() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;

    let moved = app.assertions.reparent_org(ORG, OTHER_ORG).await.expect("reparent");

    assert_eq!(moved, 1);
    let reparented = app.reload(assertion.id).await;
    assert_eq!(reparented.org_id, OTHER_ORG);
    assert!(reparented.updated);
    let record = app.record("ada@example.org").await.expect("record");
    assert!(record.token_slot(OTHER_ORG).is_some());
}

#[tokio::test]
async fn test_status_override_is_limited() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;

    let err = app
        .assertions
        .update_assertion_status(assertion.id, AssertionStatus::InOrcid)
        .await
        .expect_err("derived status");
    assert!(err.is(ErrorKind::Validation));

    let overridden = app
        .assertions
        .update_assertion_status(assertion.id, AssertionStatus::NotificationRequested)
        .await
        .expect("override");
    assert_eq!(overridden.status, AssertionStatus::NotificationRequested);
}

#[tokio::test]
async fn test_status_cleanup_rewrites_drifted_status() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;
    let mut drifted = assertion.clone();
    drifted.status = AssertionStatus::InOrcid;
    app.repos.assertions.save(&drifted).await.expect("save");

    let cleaned = app.assertions.status_cleanup().await.expect("cleanup");

    assert_eq!(cleaned, 1);
    assert_eq!(app.reload(assertion.id).await.status, AssertionStatus::Pending);
    assert_eq!(app.assertions.status_cleanup().await.expect("cleanup"), 0);
}

#[tokio::test]
async fn test_status_cleanup_keeps_put_code_assigned_meanwhile() {
    let app = TestApp::new();
    let assertion = app.create(&ctx(ORG), "ada@example.org").await;
    app.link("ada@example.org", ORG, "0000-0002-1825-0097").await;
    // Status left behind by an earlier revocation.
    let mut stale = assertion.clone();
    stale.status = AssertionStatus::UserRevokedAccess;
    app.repos.assertions.save(&stale).await.expect("save");

    app.store.pause_next_find_all();
    let cleanup = {
        let assertions = Arc::clone(&app.assertions);
        tokio::spawn(async move { assertions.status_cleanup().await })
    };
    app.store.find_all_taken().await;

    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.synced, 1);
    app.store.release_find_all();
    cleanup.await.expect("join").expect("cleanup");

    let stored = app.reload(assertion.id).await;
    assert_eq!(stored.put_code(), Some("1000"));
    assert_eq!(stored.status, AssertionStatus::InOrcid);

    let report = app.orchestrator.create_sweep().await.expect("sweep");
    assert_eq!(report.candidates, 0);
    assert_eq!(app.registry.creates(), 1);
}

#[tokio::test]
async fn test_permission_links_skip_linked_affiliates() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    app.create(&portal, "ada@example.org").await;
    app.create(&portal, "grace@example.org").await;
    app.link("ada@example.org", ORG, "0000-0002-1825-0097").await;

    let links = app.assertions.permission_links(&portal).await.expect("links");

    assert_eq!(links.len(), 1);
    assert_eq!(links[0].email, "grace@example.org");
    let (_, state) = links[0].link.split_once("state=").expect("state");
    let claims = app.linkage.signer().verify(state).expect("verify");
    assert_eq!(claims.org, ORG);
}
