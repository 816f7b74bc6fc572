//! Sessiongate HTTP client

pub mod config;
pub mod error;

use crate::transport::{Credentials, RequestOptions, Response, Transport, TransportError};
use async_trait::async_trait;
use error::ClientError;
use reqwest::{Client, ClientBuilder, header};
use sessiongate_core::{SessionStore, TOKEN_KEY};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("sessiongate/", env!("CARGO_PKG_VERSION"));

/// `reqwest`-backed [`Transport`]
///
/// Cookies set by the server are kept in the client's jar and sent back on
/// every request, whatever its [`Credentials`] mode; a cookie refresh
/// replaces the ambient credential this way. When a [`SessionStore`] is
/// attached, requests with [`Credentials::Include`] also carry the stored
/// bearer token.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    store: Option<Arc<dyn SessionStore>>,
}

impl HttpTransport {
    /// Create a new transport with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new transport builder
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Resolve a request target; absolute URLs are used unchanged
    pub fn resolve(&self, input: &str) -> Result<Url, TransportError> {
        if let Ok(url) = Url::parse(input) {
            return Ok(url);
        }
        let joined = format!("{}{}", self.base_url(), input);
        Url::parse(&joined).map_err(|e| TransportError::InvalidUrl(format!("{joined}: {e}")))
    }

    fn bearer_token(&self) -> Option<String> {
        self.store
            .as_ref()
            .and_then(|store| store.get(TOKEN_KEY))
            .filter(|token| !token.is_empty())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, input: &str, options: &RequestOptions) -> Result<Response, TransportError> {
        let url = self.resolve(input)?;
        let mut request = self
            .client
            .request(options.method.clone(), url)
            .headers(options.headers.clone());

        if options.credentials == Credentials::Include
            && !options.headers.contains_key(header::AUTHORIZATION)
        {
            if let Some(token) = self.bearer_token() {
                request = request.bearer_auth(token);
            }
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        tracing::trace!(%status, %input, "response received");

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .field("has_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for HttpTransport
#[derive(Default)]
pub struct HttpTransportBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    store: Option<Arc<dyn SessionStore>>,
}

impl HttpTransportBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Attach the store holding the bearer token
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the transport
    pub fn build(self) -> Result<HttpTransport, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/');
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url}: {e}")))?;

        let mut client_builder = ClientBuilder::new().cookie_store(true);

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        );

        let client = client_builder.build()?;

        Ok(HttpTransport {
            client,
            base_url,
            store: self.store,
        })
    }
}
