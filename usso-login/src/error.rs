//! Error types for usso-login

use std::path::PathBuf;
use usso_discharge::DischargeError;

/// Result type for usso-login operations
pub type Result<T> = std::result::Result<T, LoginError>;

/// usso-login errors
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// Reading from or writing to the terminal failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Hidden password entry on the terminal failed
    #[error("cannot read password: {0}")]
    Terminal(#[from] dialoguer::Error),

    /// Input ended before a required value was entered
    #[error("unexpected end of input reading {0}")]
    UnexpectedEof(&'static str),

    /// Token file could not be read or written
    #[error("cannot access token file {}: {source}", .path.display())]
    TokenFile {
        /// Token file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Token file is not a valid token
    #[error("cannot unmarshal token: {0}")]
    TokenUnmarshal(#[source] serde_json::Error),

    /// Token could not be serialized
    #[error("cannot marshal token: {0}")]
    TokenMarshal(#[source] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Discharge failed
    #[error(transparent)]
    Discharge(#[from] DischargeError),
}
