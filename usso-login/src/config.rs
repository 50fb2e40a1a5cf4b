//! Configuration management for usso-login

use crate::error::{LoginError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use usso_discharge::DEFAULT_SSO_URL;

/// Environment variable overriding [`LoginConfig::sso_url`]
pub const ENV_SSO_URL: &str = "USSO_URL";

/// Environment variable overriding [`LoginConfig::token_path`]
pub const ENV_TOKEN_PATH: &str = "USSO_TOKEN_PATH";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Ubuntu SSO location shown when prompting
    #[serde(default = "LoginConfig::default_sso_url")]
    pub sso_url: String,

    /// Cached token file, `~` is expanded
    #[serde(default = "LoginConfig::default_token_path")]
    pub token_path: String,

    /// Whether to ask for a one-time password
    #[serde(default = "LoginConfig::default_two_factor")]
    pub two_factor: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            sso_url: Self::default_sso_url(),
            token_path: Self::default_token_path(),
            two_factor: Self::default_two_factor(),
        }
    }
}

impl LoginConfig {
    fn default_sso_url() -> String {
        DEFAULT_SSO_URL.to_string()
    }

    fn default_token_path() -> String {
        "~/.config/usso-login/token.json".to_string()
    }

    fn default_two_factor() -> bool {
        true
    }

    /// Load configuration from the default file, applying environment overrides
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Load configuration from `path`, writing defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| LoginError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| LoginError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LoginError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| LoginError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| LoginError::Config(format!("Failed to write config: {}", e)))
    }

    /// Apply overrides looked up by environment variable name
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SSO_URL).filter(|v| !v.is_empty()) {
            self.sso_url = url;
        }
        if let Some(path) = lookup(ENV_TOKEN_PATH).filter(|v| !v.is_empty()) {
            self.token_path = path;
        }
        self
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| LoginError::Config("Cannot determine home directory".to_string()))?;

        Ok(home.join(".config").join("usso-login").join("config.toml"))
    }

    /// Get the expanded token file path
    pub fn token_path(&self) -> Result<PathBuf> {
        expand_path(&self.token_path)
    }
}

fn expand_path(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir().ok_or_else(|| {
                LoginError::Config("Cannot determine home directory".to_string())
            })?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
