//! Error types for the discharge client

use crate::macaroon::MacaroonError;

/// Result type for discharge operations
pub type Result<T> = std::result::Result<T, DischargeError>;

/// Discharge errors
#[derive(Debug, thiserror::Error)]
pub enum DischargeError {
    /// Connection, timeout or other transport failure
    #[error("cannot reach authority: {0}")]
    Transport(#[from] reqwest::Error),

    /// The authority answered with something we cannot interpret
    #[error("{0}")]
    Protocol(String),

    /// The authority returned a structured error
    #[error("{message}")]
    Remote {
        /// Human readable message from the authority
        message: String,
        /// Machine readable error code, may be empty
        code: String,
    },

    /// The authority refused the supplied credentials
    #[error("{message}")]
    CredentialsRejected {
        /// Authority message, verbatim
        message: String,
        /// Machine readable error code, may be empty
        code: String,
    },

    /// Discharging the caveat at `location` failed
    #[error("cannot get discharge from {location:?}: {source}")]
    DischargeFailed {
        /// Location of the failing third-party caveat
        location: String,
        /// Underlying failure
        source: Box<DischargeError>,
    },

    /// Annotated error
    #[error("{context}: {source}")]
    Context {
        /// What was being attempted
        context: String,
        /// Underlying failure
        source: Box<DischargeError>,
    },

    /// None of the offered interaction methods is supported
    #[error("interaction method not supported")]
    MethodNotSupported,

    /// Macaroon encoding or verification failed
    #[error(transparent)]
    Macaroon(#[from] MacaroonError),
}

impl DischargeError {
    /// Wrap this error with a description of what was being attempted
    pub fn context(self, context: impl Into<String>) -> Self {
        DischargeError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through location and context wrappers
    pub fn cause(&self) -> &DischargeError {
        match self {
            DischargeError::DischargeFailed { source, .. }
            | DischargeError::Context { source, .. } => source.cause(),
            other => other,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self.cause(), DischargeError::Transport(_))
    }

    /// Check if the authority rejected the credentials
    pub fn is_credentials_rejected(&self) -> bool {
        matches!(self.cause(), DischargeError::CredentialsRejected { .. })
    }

    /// Check if this is the method-not-supported sentinel
    pub fn is_method_not_supported(&self) -> bool {
        matches!(self.cause(), DischargeError::MethodNotSupported)
    }
}
