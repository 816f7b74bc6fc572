//! Integration tests for the validate-then-refresh session check

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use sessiongate_core::{
    FileSessionStore, REFRESH_TOKEN_KEY, SessionStore, TOKEN_KEY, TokenValidator,
};
use sessiongate_http::{
    ClientConfig, GuardOutcome, RedirectReason, RefreshConfig, RefreshError, RefreshMode,
    SessionGuard, Transport,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token(payload: &Value) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
    format!("eyJhbGciOiJIUzI1NiJ9.{encoded}.signature")
}

struct Setup {
    guard: SessionGuard,
    store: Arc<FileSessionStore>,
    redirects: Arc<AtomicUsize>,
    _dir: tempfile::TempDir,
}

fn setup(server: &MockServer) -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSessionStore::open(dir.path().join("session.json")).unwrap());

    let config = ClientConfig {
        base_url: server.uri(),
        refresh: RefreshConfig {
            mode: RefreshMode::RefreshToken,
            path: None,
        },
        ..ClientConfig::default()
    };
    let transport: Arc<dyn Transport> = Arc::new(config.build_transport(store.clone()).unwrap());
    let refresher = config.build_refresher(transport, store.clone());

    let redirects = Arc::new(AtomicUsize::new(0));
    let counter = redirects.clone();
    let guard = SessionGuard::new(
        store.clone(),
        TokenValidator::new(),
        refresher,
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    Setup {
        guard,
        store,
        redirects,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_expired_token_is_exchanged_and_persisted() {
    let server = MockServer::start().await;
    let fresh = token(&json!({"sub": "ada@example.com", "exp": 9_999_999_999_i64}));

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .and(body_json(json!({"refreshToken": "r1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": fresh.clone(), "refreshToken": "r2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let setup = setup(&server);
    setup
        .store
        .set(TOKEN_KEY, &token(&json!({"sub": "ada@example.com", "exp": 1})))
        .unwrap();
    setup.store.set(REFRESH_TOKEN_KEY, "r1").unwrap();

    let outcome = setup.guard.check().await.unwrap();
    assert!(matches!(outcome, GuardOutcome::Refreshed { .. }));
    assert_eq!(outcome.subject(), Some("ada@example.com"));
    assert_eq!(setup.redirects.load(Ordering::SeqCst), 0);

    let reopened = FileSessionStore::open(setup.store.path()).unwrap();
    assert_eq!(reopened.get(TOKEN_KEY), Some(fresh));
    assert_eq!(reopened.get(REFRESH_TOKEN_KEY).as_deref(), Some("r2"));
}

#[tokio::test]
async fn test_rejected_refresh_redirects_and_keeps_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let setup = setup(&server);
    setup
        .store
        .set(TOKEN_KEY, &token(&json!({"exp": 1})))
        .unwrap();
    setup.store.set(REFRESH_TOKEN_KEY, "revoked").unwrap();

    let outcome = setup.guard.check().await.unwrap();
    assert_eq!(
        outcome,
        GuardOutcome::Redirected {
            reason: RedirectReason::RefreshFailed(RefreshError::Rejected { status: 401 })
        }
    );
    assert_eq!(setup.redirects.load(Ordering::SeqCst), 1);
    assert_eq!(setup.store.get(REFRESH_TOKEN_KEY).as_deref(), Some("revoked"));
}

#[tokio::test]
async fn test_missing_refresh_token_skips_network() {
    let server = MockServer::start().await;

    Mock::given(path("/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let setup = setup(&server);
    setup
        .store
        .set(TOKEN_KEY, &token(&json!({"exp": 1})))
        .unwrap();

    let outcome = setup.guard.check().await.unwrap();
    assert_eq!(
        outcome,
        GuardOutcome::Redirected {
            reason: RedirectReason::RefreshFailed(RefreshError::MissingRefreshToken)
        }
    );
}

#[tokio::test]
async fn test_explicit_logout_clears_file() {
    let server = MockServer::start().await;
    let setup = setup(&server);
    setup.store.set(TOKEN_KEY, "t").unwrap();
    setup.store.set(REFRESH_TOKEN_KEY, "r").unwrap();

    setup.guard.logout().unwrap();

    let reopened = FileSessionStore::open(setup.store.path()).unwrap();
    assert_eq!(reopened.get(TOKEN_KEY), None);
    assert_eq!(reopened.get(REFRESH_TOKEN_KEY), None);
    assert_eq!(setup.redirects.load(Ordering::SeqCst), 1);
}
