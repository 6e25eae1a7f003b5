//! Single-flight token refresh.
//!
//! One [`RefreshCoordinator`] exists per client. The first `401` starts a
//! refresh; every `401` observed while it runs awaits the same shared future,
//! so N concurrent failures cost exactly one call to the refresher. The
//! in-flight slot is cleared by the refresh itself as it resolves, after the
//! store is updated and before any waiter resumes, so the next `401` after
//! that starts a new refresh.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};

use super::error::RefreshError;
use super::refresher::TokenRefresher;
use super::store::{CredentialKey, CredentialStore};
use crate::client::RequestDescriptor;
use crate::config::UnauthorizedFn;
use crate::error::{normalize, ApiError, RawFailure};
use crate::transport::TransportResponse;

/// Message used when the session cannot be recovered and the server gave none.
pub const SESSION_EXPIRED: &str = "Session expired. Please log in again.";

type RefreshResult = Result<String, Arc<RefreshError>>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;
type Slot = Mutex<Option<InFlight>>;

struct InFlight {
    generation: u64,
    future: SharedRefresh,
}

/// Why a `401` could not be turned into a successful response.
#[derive(Debug)]
pub(crate) enum Unrecovered {
    /// Terminal authentication failure.
    Auth(ApiError),
    /// The replay failed with something other than `401`; the pipeline
    /// classifies it like any other failure.
    Replay(RawFailure),
}

pub struct RefreshCoordinator {
    refresher: Option<Arc<dyn TokenRefresher>>,
    on_unauthorized: Option<UnauthorizedFn>,
    store: CredentialStore,
    slot: Arc<Slot>,
    generations: AtomicU64,
    enable_logging: bool,
}

impl RefreshCoordinator {
    pub fn new(
        refresher: Option<Arc<dyn TokenRefresher>>,
        on_unauthorized: Option<UnauthorizedFn>,
        store: CredentialStore,
        enable_logging: bool,
    ) -> Self {
        Self {
            refresher,
            on_unauthorized,
            store,
            slot: Arc::new(Mutex::new(None)),
            generations: AtomicU64::new(0),
            enable_logging,
        }
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        lock(&self.slot).is_some()
    }

    /// Forget any in-flight refresh. Callers already awaiting it still get its result.
    pub fn reset(&self) {
        lock(&self.slot).take();
    }

    /// Recover from a `401` by refreshing the token and replaying `descriptor` once.
    pub(crate) async fn handle_unauthorized<F, Fut>(
        &self,
        descriptor: &RequestDescriptor,
        rejected: TransportResponse,
        replay: F,
    ) -> Result<TransportResponse, Unrecovered>
    where
        F: FnOnce(RequestDescriptor) -> Fut,
        Fut: Future<Output = Result<TransportResponse, RawFailure>>,
    {
        let rejected = RawFailure::Status(rejected);

        let Some(refresher) = self.refresher.clone() else {
            if self.enable_logging {
                tracing::warn!("received 401 with no token refresher configured");
            }
            force_logout(&self.store, self.on_unauthorized.as_ref());
            return Err(Unrecovered::Auth(normalize(&rejected, Some(SESSION_EXPIRED))));
        };

        let token = match self.refreshed_token(refresher).await {
            Ok(token) => token,
            Err(error) => {
                if self.enable_logging {
                    tracing::error!(error = %error, "token refresh failed");
                }
                return Err(Unrecovered::Auth(normalize(&rejected, Some(SESSION_EXPIRED))));
            }
        };

        if self.enable_logging {
            tracing::debug!("token refreshed; replaying request");
        }

        match replay(descriptor.with_bearer(&token)).await {
            Ok(response) => Ok(response),
            Err(RawFailure::Status(response)) if response.status == 401 => {
                Err(Unrecovered::Auth(self.reject(response)))
            }
            Err(other) => Err(Unrecovered::Replay(other)),
        }
    }

    /// Terminal `401` that must not trigger another refresh.
    pub(crate) fn reject(&self, response: TransportResponse) -> ApiError {
        if self.enable_logging {
            tracing::warn!(status = response.status, "request still unauthorized after refresh");
        }
        force_logout(&self.store, self.on_unauthorized.as_ref());
        normalize(&RawFailure::Status(response), Some(SESSION_EXPIRED))
    }

    /// Join the in-flight refresh, or start one.
    async fn refreshed_token(&self, refresher: Arc<dyn TokenRefresher>) -> RefreshResult {
        let future = {
            let mut slot = lock(&self.slot);
            match slot.as_ref() {
                Some(in_flight) => in_flight.future.clone(),
                None => {
                    let generation = self.generations.fetch_add(1, Ordering::SeqCst);
                    let future = self.start(refresher, generation);
                    *slot = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }

    fn start(&self, refresher: Arc<dyn TokenRefresher>, generation: u64) -> SharedRefresh {
        let store = self.store.clone();
        let on_unauthorized = self.on_unauthorized.clone();
        let slot = Arc::downgrade(&self.slot);

        async move {
            let result = match refresher.refresh().await {
                Ok(token) => {
                    if let Err(error) = store.set_token(CredentialKey::AccessToken, &token) {
                        tracing::warn!(error = %error, "failed to persist refreshed access token");
                    }
                    Ok(token)
                }
                Err(error) => {
                    force_logout(&store, on_unauthorized.as_ref());
                    Err(Arc::new(error))
                }
            };
            // Store is updated first so requests dispatched after the slot
            // clears already carry the new token.
            release(&slot, generation);
            result
        }
        .boxed()
        .shared()
    }
}

/// Clear the slot if it still holds refresh `generation`.
fn release(slot: &Weak<Slot>, generation: u64) {
    let Some(slot) = slot.upgrade() else {
        return;
    };
    let mut slot = lock(&slot);
    if slot
        .as_ref()
        .is_some_and(|in_flight| in_flight.generation == generation)
    {
        *slot = None;
    }
}

fn force_logout(store: &CredentialStore, on_unauthorized: Option<&UnauthorizedFn>) {
    if let Err(error) = store.remove_token(CredentialKey::AccessToken) {
        tracing::warn!(error = %error, "failed to remove access token");
    }
    if let Some(callback) = on_unauthorized {
        callback();
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<InFlight>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::refresher::refresh_fn;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_coordinator(
        calls: Arc<AtomicUsize>,
        outcome: Result<&'static str, &'static str>,
    ) -> RefreshCoordinator {
        let refresher = refresh_fn(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                outcome
                    .map(str::to_string)
                    .map_err(|e| RefreshError::Rejected(e.to_string()))
            }
        });
        RefreshCoordinator::new(Some(refresher), None, CredentialStore::in_memory(), false)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_joins_share_one_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = counting_coordinator(calls.clone(), Ok("fresh"));
        let refresher = coordinator.refresher.clone().unwrap();

        let (a, b, c) = tokio::join!(
            coordinator.refreshed_token(refresher.clone()),
            coordinator.refreshed_token(refresher.clone()),
            coordinator.refreshed_token(refresher.clone()),
        );

        assert_eq!(a.unwrap(), "fresh");
        assert_eq!(b.unwrap(), "fresh");
        assert_eq!(c.unwrap(), "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(
            coordinator
                .store
                .get_token(CredentialKey::AccessToken)
                .unwrap()
                .as_deref(),
            Some("fresh")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slot_clears_after_failure_so_next_refresh_starts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = counting_coordinator(calls.clone(), Err("revoked"));
        let refresher = coordinator.refresher.clone().unwrap();

        assert!(coordinator.refreshed_token(refresher.clone()).await.is_err());
        assert!(!coordinator.is_refreshing());
        assert!(coordinator.refreshed_token(refresher).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_drops_the_in_flight_marker() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = counting_coordinator(calls.clone(), Ok("fresh"));
        let refresher = coordinator.refresher.clone().unwrap();

        let pending = coordinator.refreshed_token(refresher.clone());
        tokio::pin!(pending);
        assert!(futures::poll!(pending.as_mut()).is_pending());
        assert!(coordinator.is_refreshing());

        coordinator.reset();
        assert!(!coordinator.is_refreshing());
        assert_eq!(pending.await.unwrap(), "fresh");
    }
}
