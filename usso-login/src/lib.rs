//! # usso-login: credential supply for Ubuntu SSO discharge
//!
//! Terminal prompting for SSO credentials, the cached token store and the
//! configuration used by the `usso-login` binary.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod prompt;
pub mod token_store;

pub use config::LoginConfig;
pub use error::{LoginError, Result};
pub use prompt::{read_usso_params, HiddenPassword, LinePassword, PasswordReader};
pub use token_store::{FileTokenStore, SsoData, TokenStore};
