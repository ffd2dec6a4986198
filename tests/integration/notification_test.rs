//! Integration tests for notification batch requests and the send pass.

use assertion_core::error::ErrorKind;
use assertion_entity::assertion::AssertionStatus;

use crate::helpers::{Failure, ORG, OTHER_ORG, TestApp, ctx, draft};

const ADA_ORCID: &str = "0000-0002-1825-0097";

#[tokio::test]
async fn test_send_pass_notifies_known_affiliates_and_reverts_unknown() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let known = app.create(&portal, "ada@example.org").await;
    let unknown = app.create(&portal, "grace@example.org").await;
    // Ada has a registry id from linking with another organization.
    app.link("ada@example.org", OTHER_ORG, ADA_ORCID).await;

    app.assertions
        .request_notifications(&portal)
        .await
        .expect("request");
    assert_eq!(
        app.reload(known.id).await.status,
        AssertionStatus::NotificationRequested
    );

    let report = app.dispatcher.send_pass().await.expect("send pass");
    assert_eq!((report.requests, report.sent, report.reverted, report.failed), (1, 1, 1, 0));

    let notified = app.reload(known.id).await;
    assert_eq!(notified.status, AssertionStatus::NotificationSent);
    assert!(notified.notification_sent.is_some());

    let reverted = app.reload(unknown.id).await;
    assert_eq!(reverted.status, AssertionStatus::Pending);
    assert!(reverted.notification_sent.is_none());

    let sent = app.registry.sent_notifications();
    assert_eq!(sent.len(), 1);
    let (orcid, notification) = &sent[0];
    assert_eq!(orcid, ADA_ORCID);
    assert_eq!(
        notification.subject,
        "Example University has asked for permission to update your ORCID record"
    );
    assert!(
        notification
            .authorization_url
            .starts_with("https://portal.example/landing-page?state=")
    );

    assert!(!app.dispatcher.request_in_progress(ORG).await.expect("active"));
}

#[tokio::test]
async fn test_registry_lookup_finds_affiliate_who_never_linked() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let assertion = app.create(&portal, "ada@example.org").await;
    app.registry.knows_email("ada@example.org", ADA_ORCID);

    app.assertions
        .request_notifications(&portal)
        .await
        .expect("request");
    let report = app.dispatcher.send_pass().await.expect("send pass");

    assert_eq!((report.sent, report.reverted), (1, 0));
    assert_eq!(
        app.reload(assertion.id).await.status,
        AssertionStatus::NotificationSent
    );
    let sent = app.registry.sent_notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ADA_ORCID);

    // The lookup does not link the affiliate.
    let record = app.record("ada@example.org").await.expect("record");
    assert!(record.orcid().is_none());
}

#[tokio::test]
async fn test_one_notification_per_affiliate() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    app.create(&portal, "ada@example.org").await;
    let mut second = draft("ada@example.org");
    second.role_title = Some("Visiting Lecturer".to_string());
    app.assertions
        .create_assertion(&portal, second)
        .await
        .expect("second assertion");
    app.link("ada@example.org", OTHER_ORG, ADA_ORCID).await;

    app.assertions
        .request_notifications(&portal)
        .await
        .expect("request");
    let report = app.dispatcher.send_pass().await.expect("send pass");
    assert_eq!(report.sent, 1);

    let sent = app.registry.sent_notifications();
    assert_eq!(sent.len(), 1);
    let names: Vec<_> = sent[0].1.items.iter().map(|i| i.item_name.as_str()).collect();
    assert_eq!(
        names,
        [
            "Example University : Research Fellow",
            "Example University : Visiting Lecturer"
        ]
    );
}

#[tokio::test]
async fn test_second_request_conflicts_while_active() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    app.create(&portal, "ada@example.org").await;

    app.assertions
        .request_notifications(&portal)
        .await
        .expect("first request");
    let err = app
        .assertions
        .request_notifications(&portal)
        .await
        .expect_err("still active");
    assert!(err.is(ErrorKind::Conflict));

    let err = app
        .dispatcher
        .create_request(&portal)
        .await
        .expect_err("still active");
    assert!(err.is(ErrorKind::Conflict));

    // Other organizations are unaffected.
    app.dispatcher
        .create_request(&ctx(OTHER_ORG))
        .await
        .expect("other organization");
    assert!(app.dispatcher.request_in_progress(ORG).await.expect("active"));

    app.dispatcher.send_pass().await.expect("send pass");
    assert!(!app.dispatcher.request_in_progress(ORG).await.expect("active"));
    app.assertions
        .request_notifications(&portal)
        .await
        .expect("after completion");
}

#[tokio::test]
async fn test_failed_notification_still_completes_request() {
    let app = TestApp::new();
    let portal = ctx(ORG);
    let assertion = app.create(&portal, "ada@example.org").await;
    app.link("ada@example.org", OTHER_ORG, ADA_ORCID).await;
    app.registry
        .fail_notifications_for(ADA_ORCID, Failure::Api(500, "Internal Server Error"));

    app.assertions
        .request_notifications(&portal)
        .await
        .expect("request");
    let report = app.dispatcher.send_pass().await.expect("send pass");

    assert_eq!((report.requests, report.failed), (1, 1));
    assert_eq!(
        app.reload(assertion.id).await.status,
        AssertionStatus::NotificationFailed
    );
    assert!(!app.dispatcher.request_in_progress(ORG).await.expect("active"));
}

#[tokio::test]
async fn test_send_pass_without_requests_does_nothing() {
    let app = TestApp::new();
    app.create(&ctx(ORG), "ada@example.org").await;

    let report = app.dispatcher.send_pass().await.expect("send pass");

    assert_eq!(report.requests, 0);
    assert!(app.registry.sent_notifications().is_empty());
}
