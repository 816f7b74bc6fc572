//! Sessiongate HTTP layer
//!
//! Wraps a [`Transport`] in a [`SessionGate`] that refreshes an expired
//! session once and retries the failed request, and provides the
//! [`SessionGuard`] check run before a session is used.

pub mod client;
pub mod gate;
pub mod guard;
pub mod refresh;
pub mod transport;
pub mod types;

pub use client::HttpTransport;
pub use client::config::{ClientConfig, RefreshConfig, RefreshMode};
pub use client::error::ClientError;
pub use gate::SessionGate;
pub use guard::{GuardOutcome, LogoutHook, RedirectReason, SessionGuard};
pub use refresh::{
    CookieRefresher, CredentialRefresher, RefreshError, RefreshOutcome, RefreshTokenRefresher,
};
pub use transport::{Credentials, RequestOptions, Response, Transport, TransportError};

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
