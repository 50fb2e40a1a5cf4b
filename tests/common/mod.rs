//! Common test utilities shared across integration tests
//!
//! [`MockAuthority`] plays both sides of a usso_discharge login: the
//! service handing out a bootstrap macaroon and verifying the login, and
//! Ubuntu SSO discharging the third-party caveat.

use serde_json::json;
use usso_discharge::{
    wire::LoginRequest, Credentials, DischargeMacaroon, Format, Macaroon, DISCHARGE_PATH,
};
use wiremock::{
    matchers::{body_partial_json, method, path},
    Match, Mock, MockServer, Request, ResponseTemplate,
};

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "secret";
pub const OTP: &str = "123456";

pub const ROOT_KEY: &[u8] = b"test rootkey";
pub const ROOT_ID: &str = "test macaroon";
pub const THIRD_PARTY_KEY: &[u8] = b"third party root key";
pub const CAVEAT_ID: &str = "third party caveat id";

pub const LOGIN_PATH: &str = "/login";

pub const BAD_CREDENTIALS: &str = r#"{"error_list": [{"message": "Provided email/password is not correct.", "code": "invalid-credentials"}], "message": "Provided email/password is not correct.", "code": "INVALID_CREDENTIALS", "extra": {}}"#;

/// Credentials the authority accepts
pub fn good_credentials() -> Credentials {
    Credentials::new(EMAIL, PASSWORD).with_otp(OTP)
}

/// Credentials with the wrong password
pub fn bad_credentials() -> Credentials {
    Credentials::new(EMAIL, "bad-secret").with_otp(OTP)
}

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Mock service plus SSO discharge authority
pub struct MockAuthority {
    pub server: MockServer,
}

impl MockAuthority {
    pub async fn start() -> Self {
        setup_test_logging();
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.server.uri(), LOGIN_PATH)
    }

    /// Root macaroon with one third-party caveat addressed to this authority
    pub fn root_macaroon(&self) -> Macaroon {
        let mut m = Macaroon::new(ROOT_KEY, ROOT_ID, "test location");
        m.add_third_party_caveat(THIRD_PARTY_KEY, CAVEAT_ID, self.uri())
            .expect("add third party caveat");
        m
    }

    /// Discharge the authority mints for [`CAVEAT_ID`]
    pub fn discharge_macaroon() -> Macaroon {
        Macaroon::new(THIRD_PARTY_KEY, CAVEAT_ID, "test discharge location")
    }

    /// Discharge endpoint answering in the legacy V1 encoding
    pub async fn serve_discharges(&self) {
        self.serve_discharge_body(json!({
            "discharge_macaroon": DischargeMacaroon(Self::discharge_macaroon()),
        }))
        .await;
    }

    /// Discharge endpoint answering with a V2 binary encoding
    pub async fn serve_v2_discharges(&self) {
        let encoded = Self::discharge_macaroon()
            .to_base64(Format::V2)
            .expect("encode discharge");
        self.serve_discharge_body(json!({ "discharge_macaroon": encoded }))
            .await;
    }

    async fn serve_discharge_body(&self, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(DISCHARGE_PATH))
            .and(body_partial_json(json!({
                "discharge": {
                    "email": EMAIL,
                    "password": PASSWORD,
                    "otp": OTP,
                    "caveat_id": CAVEAT_ID,
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(DISCHARGE_PATH))
            .respond_with(
                ResponseTemplate::new(401)
                    .insert_header("content-type", "application/json")
                    .set_body_string(BAD_CREDENTIALS),
            )
            .with_priority(10)
            .mount(&self.server)
            .await;
    }

    /// Bootstrap macaroon served from the login URL
    pub async fn serve_bootstrap(&self, root: &Macaroon) {
        Mock::given(method("GET"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "macaroon": root })))
            .mount(&self.server)
            .await;
    }

    /// Login endpoint accepting only chains that verify against [`ROOT_KEY`]
    pub async fn serve_login(&self, expected_logins: u64) {
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(VerifiedChain {
                root_key: ROOT_KEY.to_vec(),
            })
            .respond_with(ResponseTemplate::new(200))
            .expect(expected_logins)
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "message": "login verification failed" })),
            )
            .with_priority(10)
            .mount(&self.server)
            .await;
    }
}

/// Matches login requests whose macaroon chain verifies
pub struct VerifiedChain {
    pub root_key: Vec<u8>,
}

impl Match for VerifiedChain {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<LoginRequest>(&request.body) else {
            return false;
        };
        let Some((root, discharges)) = body.login.macaroons.split_first() else {
            return false;
        };
        root.verify(&self.root_key, discharges, |_| Ok(())).is_ok()
    }
}
