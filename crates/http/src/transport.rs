//! Outbound request transport
//!
//! [`Transport`] is the seam between the session logic and the network. The
//! gate, the refreshers and the tests all talk to it instead of to `reqwest`
//! directly.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Status codes treated as a rejected or expired credential
pub const AUTH_FAILURE_STATUSES: [u16; 2] = [401, 419];

/// Whether the stored bearer token travels with a request
///
/// This only controls the `Authorization` header added by a transport.
/// Cookies held by a transport's jar (see `HttpTransport`) are sent in both
/// modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Credentials {
    /// No bearer token is attached
    #[default]
    Omit,
    /// The stored bearer token is attached unless the request sets its own
    /// `Authorization` header
    Include,
}

/// Caller-supplied request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub credentials: Credentials,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// Add a header, replacing any previous value
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a raw body
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body and content type
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body))
    }

    /// Send ambient credentials with the request
    #[must_use]
    pub fn include_credentials(mut self) -> Self {
        self.credentials = Credentials::Include;
        self
    }
}

/// Response as seen by the session logic
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// 401 or 419
    pub fn is_auth_failure(&self) -> bool {
        AUTH_FAILURE_STATUSES.contains(&self.status.as_u16())
    }

    /// Body as UTF-8 text, lossily converted
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Failure to obtain any response at all
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Request target could not be resolved to a URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection-level failure reported by a non-reqwest transport
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Sends requests and returns whatever status the server answers with
///
/// Implementations must not treat error statuses as failures; only the
/// absence of a response is a [`TransportError`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, input: &str, options: &RequestOptions) -> Result<Response, TransportError>;
}
