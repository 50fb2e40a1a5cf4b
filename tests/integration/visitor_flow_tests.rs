//! Integration tests for the usso_discharge interaction
//!
//! These tests run the complete login: bootstrap macaroon, discharge with
//! credentials, and posting the bound chain back to the service.

use assert_matches::assert_matches;
use std::collections::HashMap;
use url::Url;
use usso_discharge::{DischargeError, SsoDischargeStrategy, UssoVisitor, Visitor, PROTOCOL_NAME};
use usso_tests::common::*;

fn offer(protocol: &str, url: &str) -> HashMap<String, Url> {
    HashMap::from([(protocol.to_string(), Url::parse(url).unwrap())])
}

#[tokio::test]
async fn test_sso_login() {
    let authority = MockAuthority::start().await;
    authority.serve_bootstrap(&authority.root_macaroon()).await;
    authority.serve_discharges().await;
    authority.serve_login(1).await;

    let visitor = UssoVisitor::new(SsoDischargeStrategy::new(good_credentials()));
    visitor
        .visit_web_page(
            &reqwest::Client::new(),
            &offer(PROTOCOL_NAME, &authority.login_url()),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sso_login_bad_credentials() {
    let authority = MockAuthority::start().await;
    authority.serve_bootstrap(&authority.root_macaroon()).await;
    authority.serve_discharges().await;
    authority.serve_login(0).await;

    let visitor = UssoVisitor::new(SsoDischargeStrategy::new(bad_credentials()));
    let err = visitor
        .visit_web_page(
            &reqwest::Client::new(),
            &offer(PROTOCOL_NAME, &authority.login_url()),
        )
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .ends_with(": Provided email/password is not correct."));
    assert!(err.is_credentials_rejected());
}

#[tokio::test]
async fn test_sso_login_bootstrap_failure() {
    let authority = MockAuthority::start().await;
    authority.serve_login(0).await;

    let visitor = UssoVisitor::new(SsoDischargeStrategy::new(good_credentials()));
    let err = visitor
        .visit_web_page(
            &reqwest::Client::new(),
            &offer(PROTOCOL_NAME, &authority.login_url()),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("cannot get macaroon: "));
}

#[tokio::test]
async fn test_other_protocols_declined() {
    let authority = MockAuthority::start().await;

    let visitor = UssoVisitor::new(SsoDischargeStrategy::new(good_credentials()));
    let err = visitor
        .visit_web_page(
            &reqwest::Client::new(),
            &offer("interactive", &authority.login_url()),
        )
        .await
        .unwrap_err();
    assert_matches!(err, DischargeError::MethodNotSupported);

    let requests = authority.server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}
