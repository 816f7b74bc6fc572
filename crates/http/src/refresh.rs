//! Credential refresh strategies
//!
//! Two protocols exist and a deployment picks one of them:
//!
//! - [`CookieRefresher`] posts to the refresh endpoint and relies on the
//!   server replacing the ambient credential (typically a cookie).
//! - [`RefreshTokenRefresher`] exchanges the stored refresh token for a new
//!   bearer token and writes the result back to the [`SessionStore`].
//!
//! Callers only learn whether the refresh succeeded.

use crate::transport::{RequestOptions, Transport};
use crate::types::{RefreshTokenRequest, RefreshTokenResponse};
use async_trait::async_trait;
use sessiongate_core::{REFRESH_TOKEN_KEY, SessionStore, TOKEN_KEY};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Default path of the cookie refresh endpoint
pub const DEFAULT_COOKIE_REFRESH_PATH: &str = "/auth/refresh";

/// Default path of the refresh-token exchange endpoint
pub const DEFAULT_TOKEN_REFRESH_PATH: &str = "/refresh";

/// Why a refresh did not produce a new credential
///
/// Cloneable so every caller joined on one refresh sees the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// Refresh endpoint answered with a non-success status
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },

    /// Refresh endpoint could not be reached
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// No refresh token is stored
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// Refresh endpoint answered with an unexpected body
    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),

    /// New credentials could not be persisted
    #[error("failed to store refreshed credentials: {0}")]
    Store(String),

    /// Refresh request body could not be encoded
    #[error("failed to encode refresh request: {0}")]
    InvalidRequest(String),

    /// Refresh task ended without an outcome
    #[error("refresh was interrupted before completing")]
    Interrupted,
}

/// Result of one refresh attempt
pub type RefreshOutcome = Result<(), RefreshError>;

/// Obtains a fresh credential
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> RefreshOutcome;
}

/// Refresh by POSTing to an endpoint that resets the session cookie
pub struct CookieRefresher {
    transport: Arc<dyn Transport>,
    path: String,
}

impl CookieRefresher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_path(transport, DEFAULT_COOKIE_REFRESH_PATH)
    }

    pub fn with_path(transport: Arc<dyn Transport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl CredentialRefresher for CookieRefresher {
    async fn refresh(&self) -> RefreshOutcome {
        let options = RequestOptions::post().include_credentials();
        let response = self
            .transport
            .send(&self.path, &options)
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if response.ok() {
            debug!(path = %self.path, "session cookie refreshed");
            Ok(())
        } else {
            Err(RefreshError::Rejected {
                status: response.status.as_u16(),
            })
        }
    }
}

/// Refresh by exchanging the stored refresh token
pub struct RefreshTokenRefresher {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    path: String,
}

impl RefreshTokenRefresher {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn SessionStore>) -> Self {
        Self::with_path(transport, store, DEFAULT_TOKEN_REFRESH_PATH)
    }

    pub fn with_path(
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            store,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn persist(&self, tokens: &RefreshTokenResponse) -> RefreshOutcome {
        self.store
            .set(TOKEN_KEY, &tokens.token)
            .map_err(|e| RefreshError::Store(e.to_string()))?;
        if let Some(refresh_token) = &tokens.refresh_token {
            self.store
                .set(REFRESH_TOKEN_KEY, refresh_token)
                .map_err(|e| RefreshError::Store(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialRefresher for RefreshTokenRefresher {
    async fn refresh(&self) -> RefreshOutcome {
        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::MissingRefreshToken)?;

        let options = RequestOptions::post()
            .json(&RefreshTokenRequest { refresh_token })
            .map_err(|e| RefreshError::InvalidRequest(e.to_string()))?;

        let response = self
            .transport
            .send(&self.path, &options)
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !response.ok() {
            warn!(status = %response.status, "refresh token rejected");
            return Err(RefreshError::Rejected {
                status: response.status.as_u16(),
            });
        }

        let tokens: RefreshTokenResponse = response
            .json()
            .map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;
        self.persist(&tokens)?;

        debug!(
            rotated = tokens.refresh_token.is_some(),
            "bearer token refreshed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Credentials, MockTransport, Response, TransportError};
    use http::StatusCode;
    use sessiongate_core::MemorySessionStore;

    #[tokio::test]
    async fn test_cookie_refresh_success() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|input, options| {
                input == "/auth/refresh"
                    && options.method == http::Method::POST
                    && options.credentials == Credentials::Include
                    && options.body.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(Response::new(StatusCode::NO_CONTENT, "")));

        let refresher = CookieRefresher::new(Arc::new(transport));
        assert_eq!(refresher.refresh().await, Ok(()));
    }

    #[tokio::test]
    async fn test_cookie_refresh_rejected() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_, _| Ok(Response::new(StatusCode::UNAUTHORIZED, "")));

        let refresher = CookieRefresher::with_path(Arc::new(transport), "/session/renew");
        assert_eq!(refresher.path(), "/session/renew");
        assert_eq!(
            refresher.refresh().await,
            Err(RefreshError::Rejected { status: 401 })
        );
    }

    #[tokio::test]
    async fn test_cookie_refresh_transport_failure() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_, _| Err(TransportError::Connection("reset".into())));

        let refresher = CookieRefresher::new(Arc::new(transport));
        assert!(matches!(
            refresher.refresh().await,
            Err(RefreshError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_token_refresh_requires_stored_refresh_token() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();

        let refresher =
            RefreshTokenRefresher::new(Arc::new(transport), Arc::new(MemorySessionStore::new()));
        assert_eq!(
            refresher.refresh().await,
            Err(RefreshError::MissingRefreshToken)
        );
    }

    #[tokio::test]
    async fn test_token_refresh_persists_rotated_tokens() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(TOKEN_KEY, "old").unwrap();
        store.set(REFRESH_TOKEN_KEY, "r-old").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|input, options| {
                input == "/refresh"
                    && options.body.as_deref() == Some(br#"{"refreshToken":"r-old"}"#.as_slice())
            })
            .times(1)
            .returning(|_, _| {
                Ok(Response::new(
                    StatusCode::OK,
                    r#"{"token":"new","refreshToken":"r-new"}"#,
                ))
            });

        let refresher = RefreshTokenRefresher::new(Arc::new(transport), store.clone());
        assert_eq!(refresher.refresh().await, Ok(()));
        assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("new"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).as_deref(), Some("r-new"));
    }

    #[tokio::test]
    async fn test_token_refresh_keeps_refresh_token_when_not_rotated() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(REFRESH_TOKEN_KEY, "r1").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_, _| Ok(Response::new(StatusCode::OK, r#"{"token":"t1"}"#)));

        let refresher = RefreshTokenRefresher::new(Arc::new(transport), store.clone());
        refresher.refresh().await.unwrap();
        assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("t1"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_token_refresh_malformed_body() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(REFRESH_TOKEN_KEY, "r1").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_, _| Ok(Response::new(StatusCode::OK, "<html>")));

        let refresher = RefreshTokenRefresher::new(Arc::new(transport), store.clone());
        assert!(matches!(
            refresher.refresh().await,
            Err(RefreshError::MalformedResponse(_))
        ));
        assert_eq!(store.get(TOKEN_KEY), None);
    }

    #[test]
    fn test_request_and_response_failures_are_named_apart() {
        assert_eq!(
            RefreshError::InvalidRequest("key must be a string".into()).to_string(),
            "failed to encode refresh request: key must be a string"
        );
        assert_eq!(
            RefreshError::MalformedResponse("expected value".into()).to_string(),
            "malformed refresh response: expected value"
        );
        assert_eq!(
            RefreshError::Interrupted.to_string(),
            "refresh was interrupted before completing"
        );
    }
}
