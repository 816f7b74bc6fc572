//! Session gate: single-flight refresh and one retry
//!
//! Every request goes out with credentials included. When the server answers
//! 401 or 419 the gate refreshes the credential and re-issues the request
//! exactly once. Concurrent callers that hit an auth failure while a refresh
//! is pending share that refresh instead of starting their own. The refresh
//! runs on its own tokio task, so it finishes even when every caller waiting
//! on it has gone away.

use crate::client::error::ClientError;
use crate::refresh::{CredentialRefresher, RefreshError, RefreshOutcome};
use crate::transport::{RequestOptions, Response, Transport};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Refresh coordination slot
///
/// `None` is idle; `Some` holds the generation and the shared outcome every
/// auth failure joins until that refresh settles. The lock is never held
/// across an await point.
#[derive(Default)]
struct RefreshState {
    in_flight: Mutex<Option<(u64, PendingRefresh)>>,
    started: AtomicU64,
}

impl RefreshState {
    fn slot(&self) -> MutexGuard<'_, Option<(u64, PendingRefresh)>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Return to idle if `generation` is still the pending refresh
    fn settle(&self, generation: u64) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|(current, _)| *current == generation) {
            slot.take();
        }
    }
}

/// Settles the slot when the refresh task ends, including by panic or
/// runtime shutdown
struct SettleGuard {
    state: Arc<RefreshState>,
    generation: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.state.settle(self.generation);
    }
}

/// Wraps a [`Transport`] with refresh-and-retry on authentication failure
///
/// Clones share one refresh slot. Build separate gates (for example one per
/// API base) to keep their refreshes independent.
#[derive(Clone)]
pub struct SessionGate {
    transport: Arc<dyn Transport>,
    refresher: Arc<dyn CredentialRefresher>,
    state: Arc<RefreshState>,
}

impl SessionGate {
    pub fn new(transport: Arc<dyn Transport>, refresher: Arc<dyn CredentialRefresher>) -> Self {
        Self {
            transport,
            refresher,
            state: Arc::new(RefreshState::default()),
        }
    }

    /// Send a request, refreshing the session and retrying once on 401/419
    ///
    /// A failed refresh yields [`ClientError::SessionExpired`] and the request
    /// is not retried. Whatever the retry returns is passed back as-is, even
    /// another auth failure.
    pub async fn request(
        &self,
        input: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        let options = options.include_credentials();

        let response = self.transport.send(input, &options).await?;
        if !response.is_auth_failure() {
            return Ok(response);
        }

        debug!(status = %response.status, %input, "authentication failure, refreshing session");
        if let Err(err) = self.join_or_start_refresh().await {
            warn!(error = %err, %input, "session refresh failed");
            return Err(ClientError::SessionExpired(err));
        }

        trace!(%input, "retrying request after refresh");
        Ok(self.transport.send(input, &options).await?)
    }

    /// Send a request and decode a successful JSON body
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        input: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let response = self.request(input, options).await?;
        if response.ok() {
            Ok(response.json()?)
        } else {
            let message = match response.text() {
                text if text.is_empty() => response.status.to_string(),
                text => text,
            };
            Err(ClientError::from_status(response.status, message))
        }
    }

    /// GET a JSON resource
    pub async fn get_json<T: DeserializeOwned>(&self, input: &str) -> Result<T, ClientError> {
        self.execute_json(input, RequestOptions::get()).await
    }

    /// POST a JSON body and decode the JSON answer
    pub async fn post_json<B, T>(&self, input: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let options = RequestOptions::post().json(body)?;
        self.execute_json(input, options).await
    }

    /// Whether a refresh is currently pending
    pub fn is_refreshing(&self) -> bool {
        self.state.slot().is_some()
    }

    /// Number of refresh calls this gate has started
    pub fn refresh_count(&self) -> u64 {
        self.state.started.load(Ordering::Relaxed)
    }

    fn join_or_start_refresh(&self) -> PendingRefresh {
        let mut slot = self.state.slot();
        if let Some((_, pending)) = slot.as_ref() {
            debug!("joining in-flight session refresh");
            return pending.clone();
        }

        let generation = self.state.started.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = oneshot::channel();
        let pending = receiver
            .map(|received| received.unwrap_or(Err(RefreshError::Interrupted)))
            .boxed()
            .shared();
        *slot = Some((generation, pending.clone()));
        drop(slot);

        // Completes even if every caller is dropped
        let refresher = Arc::clone(&self.refresher);
        let guard = SettleGuard {
            state: Arc::clone(&self.state),
            generation,
        };
        tokio::spawn(async move {
            let outcome = refresher.refresh().await;
            drop(guard);
            debug!(generation, success = outcome.is_ok(), "session refresh settled");
            let _ = sender.send(outcome);
        });

        pending
    }
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("refreshing", &self.is_refreshing())
            .field("refresh_count", &self.refresh_count())
            .finish_non_exhaustive()
    }
}
