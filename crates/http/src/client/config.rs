//! Client configuration
//!
//! Values are layered: built-in defaults, then an optional TOML/YAML file,
//! then `SESSIONGATE__*` environment variables.

use super::HttpTransport;
use super::error::ClientError;
use crate::refresh::{
    CookieRefresher, CredentialRefresher, DEFAULT_COOKIE_REFRESH_PATH, DEFAULT_TOKEN_REFRESH_PATH,
    RefreshTokenRefresher,
};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use sessiongate_core::SessionStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SESSIONGATE";

/// How expired credentials are renewed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// POST to the refresh endpoint; the server resets the session cookie
    #[default]
    Cookie,
    /// Exchange the stored refresh token for a new bearer token
    RefreshToken,
}

impl RefreshMode {
    /// Endpoint used when none is configured
    pub const fn default_path(self) -> &'static str {
        match self {
            Self::Cookie => DEFAULT_COOKIE_REFRESH_PATH,
            Self::RefreshToken => DEFAULT_TOKEN_REFRESH_PATH,
        }
    }
}

/// Refresh endpoint configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Refresh protocol
    #[serde(default)]
    pub mode: RefreshMode,

    /// Endpoint path; defaults per mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RefreshConfig {
    /// Configured path or the mode's default
    pub fn path(&self) -> &str {
        self.path
            .as_deref()
            .unwrap_or_else(|| self.mode.default_path())
    }
}

/// Main client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds (0 = no timeout)
    #[serde(default)]
    pub timeout_secs: u64,

    /// User agent override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Refresh configuration
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Session file; defaults to the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
            user_agent: None,
            refresh: RefreshConfig::default(),
            store_path: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value fails to parse
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("timeout_secs", defaults.timeout_secs)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Configuration("base_url must not be empty".into()));
        }
        if !self.refresh.path().starts_with('/') && !self.refresh.path().contains("://") {
            return Err(ClientError::Configuration(format!(
                "refresh path must start with '/' or be absolute: {}",
                self.refresh.path()
            )));
        }
        Ok(())
    }

    /// Request timeout, if any
    pub const fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Build the HTTP transport described by this configuration
    pub fn build_transport(
        &self,
        store: Arc<dyn SessionStore>,
    ) -> Result<HttpTransport, ClientError> {
        let mut builder = HttpTransport::builder()
            .base_url(&self.base_url)
            .session_store(store);
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder.build()
    }

    /// Build the configured refresh strategy
    pub fn build_refresher(
        &self,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Arc<dyn CredentialRefresher> {
        let path = self.refresh.path();
        match self.refresh.mode {
            RefreshMode::Cookie => Arc::new(CookieRefresher::with_path(transport, path)),
            RefreshMode::RefreshToken => {
                Arc::new(RefreshTokenRefresher::with_path(transport, store, path))
            }
        }
    }

    /// Refresh-token strategy regardless of the configured mode
    ///
    /// The validate-then-refresh flow always exchanges refresh tokens.
    pub fn build_token_refresher(
        &self,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Arc<dyn CredentialRefresher> {
        let path = match self.refresh.mode {
            RefreshMode::RefreshToken => self.refresh.path(),
            RefreshMode::Cookie => DEFAULT_TOKEN_REFRESH_PATH,
        };
        Arc::new(RefreshTokenRefresher::with_path(transport, store, path))
    }
}
