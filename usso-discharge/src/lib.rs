//! # usso-discharge: Ubuntu SSO discharge client
//!
//! Obtains discharge macaroons for third-party caveats addressed to Ubuntu
//! SSO by submitting account credentials (email, password and an optional
//! one-time password), and assembles the bound macaroon chain a verifier
//! expects.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────────────────────┐
//! │   SERVICE                    │
//! │   offers usso_discharge URL  │
//! └──────────────────────────────┘
//!               ↓  GET <url>
//!   bootstrap macaroon with SSO third-party caveat
//!               ↓
//! ┌──────────────────────────────┐
//! │   UBUNTU SSO                 │
//! │   POST /api/v2/tokens/       │
//! │        discharge             │
//! │   {email, password, otp,     │
//! │    caveat_id}                │
//! └──────────────────────────────┘
//!               ↓
//!   discharge macaroon (legacy V1), bound to the root signature
//!               ↓  POST <url> {login: {macaroons}}
//! ┌──────────────────────────────┐
//! │   SERVICE                    │
//! │   verifies [root, discharge] │
//! └──────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod discharge;
pub mod error;
pub mod macaroon;
pub mod visitor;
pub mod wire;

// Re-exports for convenience
pub use client::{fetch_macaroon, login, Discharger, DISCHARGE_PATH};
pub use error::{DischargeError, Result};
pub use macaroon::{Caveat, DischargeMacaroon, Format, Macaroon, MacaroonError};
pub use visitor::{
    DischargeStrategy, SsoDischargeStrategy, UssoVisitor, Visitor, PROTOCOL_NAME,
};
pub use wire::Credentials;

/// Default Ubuntu SSO location
pub const DEFAULT_SSO_URL: &str = "https://login.ubuntu.com";

/// Maximum number of discharges collected for one macaroon
pub const MAX_DISCHARGES: usize = 64;
