//! Integration tests for acquiring and assembling discharges
//!
//! These tests verify that the discharger:
//! - Accepts legacy V1 and current V2 discharge encodings alike
//! - Binds discharges to the root signature
//! - Reports rejected credentials with the authority's message
//! - Keeps transport failures distinct from credential failures

use assert_matches::assert_matches;
use usso_discharge::{Caveat, DischargeError, Discharger, Macaroon};
use usso_tests::common::*;

fn sso_caveat(authority: &MockAuthority) -> Caveat {
    Caveat {
        id: CAVEAT_ID.as_bytes().to_vec(),
        verification_id: None,
        location: Some(authority.uri()),
    }
}

#[tokio::test]
async fn test_acquire_discharge_legacy_format() {
    let authority = MockAuthority::start().await;
    authority.serve_discharges().await;

    let m = Discharger::new()
        .acquire_discharge(&sso_caveat(&authority), &good_credentials())
        .await
        .unwrap();
    assert_eq!(m, MockAuthority::discharge_macaroon());
}

#[tokio::test]
async fn test_acquire_discharge_current_format() {
    let authority = MockAuthority::start().await;
    authority.serve_v2_discharges().await;

    let m = Discharger::new()
        .acquire_discharge(&sso_caveat(&authority), &good_credentials())
        .await
        .unwrap();
    assert_eq!(m, MockAuthority::discharge_macaroon());
}

#[tokio::test]
async fn test_acquire_discharge_rejected() {
    let authority = MockAuthority::start().await;
    authority.serve_discharges().await;

    let err = Discharger::new()
        .acquire_discharge(&sso_caveat(&authority), &bad_credentials())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Provided email/password is not correct.");
    assert!(err.is_credentials_rejected());
}

#[tokio::test]
async fn test_discharge_all() {
    let authority = MockAuthority::start().await;
    authority.serve_discharges().await;
    let root = authority.root_macaroon();

    let chain = Discharger::new()
        .discharge_all(&root, &good_credentials())
        .await
        .unwrap();

    let mut discharge = MockAuthority::discharge_macaroon();
    discharge.bind(root.signature());
    assert_eq!(chain, vec![root.clone(), discharge]);

    root.verify(ROOT_KEY, &chain[1..], |_| Ok(())).unwrap();
}

#[tokio::test]
async fn test_discharge_all_bad_password() {
    let authority = MockAuthority::start().await;
    authority.serve_discharges().await;
    let root = authority.root_macaroon();

    let err = Discharger::new()
        .discharge_all(&root, &bad_credentials())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "cannot get discharge from {:?}: Provided email/password is not correct.",
            authority.uri()
        )
    );
    assert_matches!(
        &err,
        DischargeError::DischargeFailed { location, .. } if *location == authority.uri()
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_discharge_all_transport_failure() {
    setup_test_logging();
    let unreachable = "http://127.0.0.1:1";
    let mut root = Macaroon::new(ROOT_KEY, ROOT_ID, "test location");
    root.add_third_party_caveat(THIRD_PARTY_KEY, CAVEAT_ID, unreachable)
        .unwrap();

    let err = Discharger::new()
        .discharge_all(&root, &good_credentials())
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .starts_with(&format!("cannot get discharge from {:?}: ", unreachable)));
    assert_matches!(err.cause(), DischargeError::Transport(_));
    assert!(err.is_retryable());
    assert!(!err.is_credentials_rejected());
}
