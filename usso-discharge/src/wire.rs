//! Request and response bodies exchanged with the discharge authority

use crate::macaroon::{Caveat, DischargeMacaroon, Macaroon};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials submitted with a discharge request
///
/// An empty `otp` means no second factor. Passed in fresh for every
/// discharge; nothing here is cached.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Ubuntu SSO account email
    pub email: String,

    /// Account password
    pub password: String,

    /// One-time password for two-factor accounts
    pub otp: String,
}

impl Credentials {
    /// Create credentials without a second factor
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            otp: String::new(),
        }
    }

    /// Add a one-time password
    pub fn with_otp(mut self, otp: impl Into<String>) -> Self {
        self.otp = otp.into();
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("otp", &if self.otp.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// `POST /api/v2/tokens/discharge` body
#[derive(Serialize, Deserialize)]
pub struct DischargeRequest {
    /// Discharge parameters
    pub discharge: DischargeParams,
}

/// Discharge parameters
///
/// All four fields are required by the authority. They are forwarded as
/// given; the authority reports anything missing.
#[derive(Serialize, Deserialize)]
pub struct DischargeParams {
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
    /// One-time password
    pub otp: String,
    /// Identifier of the caveat being discharged
    pub caveat_id: String,
}

impl DischargeRequest {
    /// Build the request for `caveat` with the given credentials
    pub fn new(caveat: &Caveat, credentials: &Credentials) -> Self {
        Self {
            discharge: DischargeParams {
                email: credentials.email.clone(),
                password: credentials.password.clone(),
                otp: credentials.otp.clone(),
                caveat_id: String::from_utf8_lossy(&caveat.id).into_owned(),
            },
        }
    }
}

/// Successful discharge response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeResponse {
    /// Discharge macaroon, usually in the legacy V1 encoding
    pub discharge_macaroon: DischargeMacaroon,
}

/// Bootstrap macaroon response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacaroonResponse {
    /// Macaroon carrying the SSO third-party caveat
    pub macaroon: Macaroon,
}

/// `POST <login-url>` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login parameters
    pub login: LoginParams,
}

/// Login parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginParams {
    /// Discharged macaroon chain, root first
    pub macaroons: Vec<Macaroon>,
}

/// Structured error body returned by the authority
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Canonical human readable message
    #[serde(default)]
    pub message: String,

    /// Error code, e.g. `INVALID_CREDENTIALS`
    #[serde(default)]
    pub code: String,

    /// Individual errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_list: Vec<ErrorDetail>,

    /// Extra information, shape varies by error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Entry in [`ErrorResponse::error_list`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Message
    #[serde(default)]
    pub message: String,
    /// Code, e.g. `invalid-credentials`
    #[serde(default)]
    pub code: String,
}
