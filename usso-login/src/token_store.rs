//! Cached SSO token storage

use crate::error::{LoginError, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, io::Write, path::PathBuf};
use tracing::debug;

/// OAuth token issued by Ubuntu SSO
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoData {
    /// OAuth consumer key
    pub consumer_key: String,
    /// OAuth consumer secret
    pub consumer_secret: String,
    /// OAuth realm
    pub realm: String,
    /// Token key
    pub token_key: String,
    /// Human readable token name
    pub token_name: String,
    /// Token secret
    pub token_secret: String,
}

impl fmt::Debug for SsoData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsoData")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("realm", &self.realm)
            .field("token_key", &self.token_key)
            .field("token_name", &self.token_name)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// Storage for a cached SSO token
pub trait TokenStore {
    /// Store `token`, replacing any previous one
    fn save_token(&self, token: &SsoData) -> Result<()>;

    /// Read the stored token
    fn read_token(&self) -> Result<SsoData>;
}

/// Token store backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store using the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the token file
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn file_error(&self, source: std::io::Error) -> LoginError {
        LoginError::TokenFile {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStore for FileTokenStore {
    fn save_token(&self, token: &SsoData) -> Result<()> {
        let data = serde_json::to_vec(token).map_err(LoginError::TokenMarshal)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.file_error(e))?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
        let mut file = options.open(&self.path).map_err(|e| self.file_error(e))?;

        // an existing file keeps its mode on open
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| self.file_error(e))?;
        }
        file.write_all(&data).map_err(|e| self.file_error(e))?;

        debug!(path = %self.path.display(), "saved token");
        Ok(())
    }

    fn read_token(&self) -> Result<SsoData> {
        let data = fs::read(&self.path).map_err(|e| self.file_error(e))?;
        serde_json::from_slice(&data).map_err(LoginError::TokenUnmarshal)
    }
}
