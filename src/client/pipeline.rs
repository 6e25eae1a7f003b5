//! Request execution: auth header, dispatch, classification, retry and 401 recovery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use uuid::Uuid;

use super::request::{join_url, RequestDescriptor};
use crate::auth::refresh::{RefreshCoordinator, Unrecovered};
use crate::auth::{CredentialKey, CredentialStore};
use crate::config::ClientOptions;
use crate::error::{normalize, ApiError, RawFailure};
use crate::transport::{Transport, TransportRequest, TransportResponse};
use crate::util::cancel::with_cancellation;
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

/// Settings that may change after construction.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
}

pub(crate) struct Pipeline {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    refresh: RefreshCoordinator,
    settings: RwLock<Settings>,
    retry: RetryPolicy,
    enable_logging: bool,
    detached: AtomicBool,
}

impl Pipeline {
    pub(crate) fn new(
        options: ClientOptions,
        store: CredentialStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let refresh = RefreshCoordinator::new(
            options.token_refresher,
            options.on_unauthorized,
            store.clone(),
            options.enable_logging,
        );
        Self {
            transport,
            store,
            refresh,
            settings: RwLock::new(Settings {
                base_url: options.base_url,
                timeout: options.timeout,
            }),
            retry: RetryPolicy::new(options.retry_attempts, options.retry_delay),
            enable_logging: options.enable_logging,
            detached: AtomicBool::new(false),
        }
    }

    pub(crate) fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub(crate) fn refresh(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub(crate) fn enable_logging(&self) -> bool {
        self.enable_logging
    }

    pub(crate) fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_base_url(&self, base_url: String) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .base_url = base_url;
    }

    pub(crate) fn set_timeout(&self, timeout: Duration) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .timeout = timeout;
    }

    /// Stop attaching credentials and intercepting `401`s; drop refresh state.
    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
        self.refresh.reset();
    }

    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Run `descriptor` to a successful response or a normalized error.
    pub(crate) async fn execute(
        &self,
        mut descriptor: RequestDescriptor,
    ) -> Result<TransportResponse, ApiError> {
        let request_id = Uuid::new_v4();
        let mut attempt: u32 = 0;
        let mut refreshed = false;

        loop {
            let failure = match self.dispatch(self.authorize(&descriptor), request_id).await {
                Ok(response) => return Ok(response),
                Err(RawFailure::Status(response))
                    if response.status == 401 && !self.is_detached() =>
                {
                    if refreshed {
                        return Err(self.refresh.reject(response));
                    }
                    refreshed = true;
                    let recovered = self
                        .refresh
                        .handle_unauthorized(&descriptor, response, |replayed| {
                            self.dispatch(replayed, request_id)
                        })
                        .await;
                    match recovered {
                        Ok(response) => return Ok(response),
                        Err(Unrecovered::Auth(error)) => return Err(error),
                        Err(Unrecovered::Replay(failure)) => failure,
                    }
                }
                Err(failure) => failure,
            };

            if !self.retry.should_retry(attempt, &failure) {
                return Err(normalize(&failure, None));
            }

            let delay = self.retry.delay_for(attempt);
            if self.enable_logging {
                tracing::warn!(
                    %request_id,
                    attempt = attempt + 1,
                    max_attempts = self.retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    status = ?failure.status(),
                    "Retrying request"
                );
            }
            tokio::time::sleep(delay).await;
            // A token that fired while this retry was queued only aborts the
            // call that was in flight; the queued retry still goes out.
            if descriptor.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
                descriptor.cancel = None;
            }
            attempt += 1;
        }
    }

    /// Attach the stored access token, if any.
    fn authorize(&self, descriptor: &RequestDescriptor) -> RequestDescriptor {
        if self.is_detached() {
            return descriptor.clone();
        }
        match self.store.get_token(CredentialKey::AccessToken) {
            Ok(Some(token)) => descriptor.with_bearer(&token),
            Ok(None) => descriptor.clone(),
            Err(error) => {
                tracing::warn!(error = %error, "failed to read access token");
                descriptor.clone()
            }
        }
    }

    /// One transport call, classified into success or a raw failure.
    async fn dispatch(
        &self,
        descriptor: RequestDescriptor,
        request_id: Uuid,
    ) -> Result<TransportResponse, RawFailure> {
        let settings = self.settings();
        let timeout = descriptor.timeout.unwrap_or(settings.timeout);
        let request = TransportRequest {
            method: descriptor.method.clone(),
            url: join_url(&settings.base_url, &descriptor.endpoint),
            headers: descriptor.headers.clone(),
            body: descriptor.body.clone(),
            timeout,
            on_upload_progress: descriptor.on_upload_progress.clone(),
        };

        if self.enable_logging {
            tracing::debug!(%request_id, method = %request.method, url = %request.url, "API request");
        }

        let result = with_cancellation(
            descriptor.cancel.as_ref(),
            with_timeout(timeout, self.transport.send(request)),
        )
        .await;

        match result {
            Ok(response) if response.is_success() => {
                if self.enable_logging {
                    tracing::debug!(%request_id, status = response.status, "API response");
                }
                Ok(response)
            }
            Ok(response) => {
                if self.enable_logging {
                    tracing::debug!(%request_id, status = response.status, "API error response");
                }
                Err(RawFailure::Status(response))
            }
            Err(error) => {
                if self.enable_logging {
                    tracing::debug!(%request_id, error = %error, "API transport failure");
                }
                Err(RawFailure::Transport(error))
            }
        }
    }
}
