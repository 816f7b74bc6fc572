//! Validate-then-refresh session check
//!
//! [`SessionGuard::check`] looks at the stored bearer token before any request
//! is made. An expired token is exchanged through the refresh-token flow; any
//! other defect ends the session.

use crate::refresh::{CredentialRefresher, RefreshError};
use serde::Serialize;
use sessiongate_core::{
    Claims, CoreResult, InvalidReason, REFRESH_TOKEN_KEY, SessionStore, TOKEN_KEY, TokenValidator,
    ValidationResult,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sends the user back to the login entry point
pub trait LogoutHook: Send + Sync {
    fn redirect_to_login(&self);
}

impl<F> LogoutHook for F
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        self()
    }
}

/// Why the guard redirected without clearing the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RedirectReason {
    NoToken,
    RefreshFailed(#[serde(serialize_with = "display")] RefreshError),
}

fn display<S: serde::Serializer>(err: &RefreshError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(err)
}

/// Result of a session check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GuardOutcome {
    /// Stored token is valid
    Authenticated { claims: Claims },
    /// Stored token had expired and was replaced
    Refreshed { claims: Claims },
    /// Session was cleared
    LoggedOut { reason: InvalidReason },
    /// User was sent to log in; stored credentials were left alone
    Redirected { reason: RedirectReason },
}

impl GuardOutcome {
    /// Claims of an authenticated session
    pub const fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Authenticated { claims } | Self::Refreshed { claims } => Some(claims),
            _ => None,
        }
    }

    /// Whether the session can be used
    pub const fn is_authenticated(&self) -> bool {
        self.claims().is_some()
    }

    /// User identifier to display
    pub fn subject(&self) -> Option<&str> {
        self.claims().and_then(Claims::subject)
    }
}

pub struct SessionGuard {
    store: Arc<dyn SessionStore>,
    validator: TokenValidator,
    refresher: Arc<dyn CredentialRefresher>,
    hook: Arc<dyn LogoutHook>,
}

impl SessionGuard {
    pub fn new(
        store: Arc<dyn SessionStore>,
        validator: TokenValidator,
        refresher: Arc<dyn CredentialRefresher>,
        hook: Arc<dyn LogoutHook>,
    ) -> Self {
        Self {
            store,
            validator,
            refresher,
            hook,
        }
    }

    /// Check the stored token, refreshing it once if it has expired
    pub async fn check(&self) -> CoreResult<GuardOutcome> {
        let Some(token) = self.stored_token() else {
            debug!("no stored token");
            return Ok(self.redirect(RedirectReason::NoToken));
        };

        let reason = match self.validator.validate(Some(&token)) {
            ValidationResult::Valid { claims } => {
                return Ok(GuardOutcome::Authenticated { claims });
            }
            ValidationResult::Invalid { reason } => reason,
        };
        warn!(%reason, "token validation failed");

        if reason != InvalidReason::Expired {
            self.logout()?;
            return Ok(GuardOutcome::LoggedOut { reason });
        }

        if let Err(err) = self.refresher.refresh().await {
            warn!(error = %err, "token refresh failed");
            return Ok(self.redirect(RedirectReason::RefreshFailed(err)));
        }

        match self.validator.validate(self.stored_token().as_deref()) {
            ValidationResult::Valid { claims } => {
                debug!(subject = ?claims.subject(), "session refreshed");
                Ok(GuardOutcome::Refreshed { claims })
            }
            ValidationResult::Invalid { reason } => {
                warn!(%reason, "refreshed token is not valid");
                self.logout()?;
                Ok(GuardOutcome::LoggedOut { reason })
            }
        }
    }

    /// Remove stored credentials and redirect to login
    pub fn logout(&self) -> CoreResult<()> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        info!("session cleared");
        self.hook.redirect_to_login();
        Ok(())
    }

    fn stored_token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|token| !token.is_empty())
    }

    fn redirect(&self, reason: RedirectReason) -> GuardOutcome {
        self.hook.redirect_to_login();
        GuardOutcome::Redirected { reason }
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::MockCredentialRefresher;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::{Value, json};
    use sessiongate_core::{FixedClock, MemorySessionStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NOW: i64 = 1_750_000_000;

    fn token(payload: &Value) -> String {
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        format!("eyJhbGciOiJIUzI1NiJ9.{encoded}.sig")
    }

    struct Harness {
        store: Arc<MemorySessionStore>,
        redirects: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemorySessionStore::new()),
                redirects: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn guard(&self, refresher: MockCredentialRefresher) -> SessionGuard {
            let redirects = self.redirects.clone();
            SessionGuard::new(
                self.store.clone(),
                TokenValidator::with_clock(Arc::new(FixedClock(NOW))),
                Arc::new(refresher),
                Arc::new(move || {
                    redirects.fetch_add(1, Ordering::SeqCst);
                }),
            )
        }

        fn redirects(&self) -> usize {
            self.redirects.load(Ordering::SeqCst)
        }
    }

    fn idle_refresher() -> MockCredentialRefresher {
        let mut refresher = MockCredentialRefresher::new();
        refresher.expect_refresh().never();
        refresher
    }

    #[tokio::test]
    async fn test_valid_token_is_authenticated() {
        let harness = Harness::new();
        harness
            .store
            .set(TOKEN_KEY, &token(&json!({"sub": "ada@example.com", "exp": NOW + 60})))
            .unwrap();

        let outcome = harness.guard(idle_refresher()).check().await.unwrap();
        assert!(outcome.is_authenticated());
        assert_eq!(outcome.subject(), Some("ada@example.com"));
        assert_eq!(harness.redirects(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_redirects() {
        let harness = Harness::new();
        harness.store.set(REFRESH_TOKEN_KEY, "r1").unwrap();

        let outcome = harness.guard(idle_refresher()).check().await.unwrap();
        assert_eq!(
            outcome,
            GuardOutcome::Redirected {
                reason: RedirectReason::NoToken
            }
        );
        assert_eq!(harness.redirects(), 1);
        assert_eq!(harness.store.get(REFRESH_TOKEN_KEY).as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_malformed_token_logs_out() {
        let harness = Harness::new();
        harness.store.set(TOKEN_KEY, "not-a-token").unwrap();
        harness.store.set(REFRESH_TOKEN_KEY, "r1").unwrap();

        let outcome = harness.guard(idle_refresher()).check().await.unwrap();
        assert_eq!(
            outcome,
            GuardOutcome::LoggedOut {
                reason: InvalidReason::MalformedFormat
            }
        );
        assert_eq!(harness.store.get(TOKEN_KEY), None);
        assert_eq!(harness.store.get(REFRESH_TOKEN_KEY), None);
        assert_eq!(harness.redirects(), 1);
    }

    #[tokio::test]
    async fn test_not_yet_valid_token_logs_out_without_refresh() {
        let harness = Harness::new();
        harness
            .store
            .set(TOKEN_KEY, &token(&json!({"nbf": NOW + 600})))
            .unwrap();

        let outcome = harness.guard(idle_refresher()).check().await.unwrap();
        assert_eq!(
            outcome,
            GuardOutcome::LoggedOut {
                reason: InvalidReason::NotYetValid
            }
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let harness = Harness::new();
        harness
            .store
            .set(TOKEN_KEY, &token(&json!({"sub": "ada", "exp": NOW - 1})))
            .unwrap();

        let store = harness.store.clone();
        let mut refresher = MockCredentialRefresher::new();
        refresher.expect_refresh().times(1).returning(move || {
            store
                .set(TOKEN_KEY, &token(&json!({"sub": "ada", "exp": NOW + 900})))
                .unwrap();
            Ok(())
        });

        let outcome = harness.guard(refresher).check().await.unwrap();
        assert!(matches!(outcome, GuardOutcome::Refreshed { .. }));
        assert_eq!(outcome.subject(), Some("ada"));
        assert_eq!(harness.redirects(), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_redirects() {
        let harness = Harness::new();
        harness
            .store
            .set(TOKEN_KEY, &token(&json!({"exp": NOW - 1})))
            .unwrap();

        let mut refresher = MockCredentialRefresher::new();
        refresher
            .expect_refresh()
            .times(1)
            .returning(|| Err(RefreshError::MissingRefreshToken));

        let outcome = harness.guard(refresher).check().await.unwrap();
        assert_eq!(
            outcome,
            GuardOutcome::Redirected {
                reason: RedirectReason::RefreshFailed(RefreshError::MissingRefreshToken)
            }
        );
        assert_eq!(harness.redirects(), 1);
        assert!(harness.store.get(TOKEN_KEY).is_some());
    }

    #[tokio::test]
    async fn test_refresh_yielding_expired_token_logs_out() {
        let harness = Harness::new();
        let stale = token(&json!({"exp": NOW - 1}));
        harness.store.set(TOKEN_KEY, &stale).unwrap();

        let mut refresher = MockCredentialRefresher::new();
        refresher.expect_refresh().times(1).returning(|| Ok(()));

        let outcome = harness.guard(refresher).check().await.unwrap();
        assert_eq!(
            outcome,
            GuardOutcome::LoggedOut {
                reason: InvalidReason::Expired
            }
        );
        assert_eq!(harness.store.get(TOKEN_KEY), None);
        assert_eq!(harness.redirects(), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = GuardOutcome::Redirected {
            reason: RedirectReason::RefreshFailed(RefreshError::Rejected { status: 401 }),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "outcome": "redirected",
                "reason": {"kind": "refresh_failed", "detail": "refresh rejected with status 401"}
            })
        );
    }
}
