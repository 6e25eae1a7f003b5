//! Caller-facing API client.

mod pipeline;
pub mod request;

pub use request::{join_url, RequestDescriptor, RequestOptions};

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::auth::{CredentialStore, StorageKind};
use crate::config::ClientOptions;
use crate::error::ApiError;
use crate::transport::{FormData, ProgressFn, ReqwestTransport, RequestBody, Transport, TransportResponse};
use pipeline::Pipeline;

/// Snapshot of the effective client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub enable_logging: bool,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

/// HTTP API client with bearer auth, single-flight token refresh and
/// exponential-backoff retries.
///
/// Cloning is cheap; clones share credentials and refresh state.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use tether::prelude::*;
///
/// # async fn example() -> Result<(), ApiError> {
/// let options = ClientOptions::builder()
///     .base_url("https://api.example.com")
///     .on_unauthorized(Arc::new(|| eprintln!("session expired")) as tether::config::UnauthorizedFn)
///     .token_refresher(refresh_fn(|| async { Ok("fresh-token".to_string()) }))
///     .build();
/// let client = ApiClient::with_store(options, CredentialStore::in_memory());
///
/// #[derive(serde::Deserialize)]
/// struct User { name: String }
///
/// let user: User = client.get("/me", RequestOptions::default()).await?;
/// println!("{}", user.name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Pipeline>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client over the durable credential store and the shared reqwest transport.
    pub fn new(options: impl Into<ClientOptions>) -> Self {
        Self::with_store(options, CredentialStore::new(StorageKind::Durable))
    }

    pub fn with_store(options: impl Into<ClientOptions>, store: CredentialStore) -> Self {
        Self::with_transport(options, store, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        options: impl Into<ClientOptions>,
        store: CredentialStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(Pipeline::new(options.into(), store, transport)),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.send(RequestDescriptor::new(Method::GET, endpoint, options))
            .await
    }

    pub async fn post<T, B>(
        &self,
        endpoint: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::POST, endpoint, body, options)
            .await
    }

    pub async fn put<T, B>(
        &self,
        endpoint: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::PUT, endpoint, body, options)
            .await
    }

    pub async fn patch<T, B>(
        &self,
        endpoint: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::PATCH, endpoint, body, options)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.send(RequestDescriptor::new(Method::DELETE, endpoint, options))
            .await
    }

    /// Multipart `POST` with optional upload progress (0–100) and cancellation.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: FormData,
        on_progress: Option<ProgressFn>,
        cancel: Option<CancellationToken>,
    ) -> Result<T, ApiError> {
        let options = RequestOptions {
            cancel,
            ..RequestOptions::default()
        };
        let mut descriptor = RequestDescriptor::new(Method::POST, endpoint, options)
            .with_body(RequestBody::Form(form));
        if let Some(sink) = on_progress {
            descriptor = descriptor.with_upload_progress(sink);
        }
        self.send(descriptor).await
    }

    /// Execute a prepared descriptor and decode the body into `T`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, ApiError> {
        let response = self.inner.execute(descriptor).await?;
        decode(&response)
    }

    /// Execute a prepared descriptor and return the raw response.
    pub async fn send_raw(&self, descriptor: RequestDescriptor) -> Result<TransportResponse, ApiError> {
        self.inner.execute(descriptor).await
    }

    async fn send_with_body<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut descriptor = RequestDescriptor::new(method, endpoint, options);
        if let Some(body) = body {
            let value = serde_json::to_value(body)
                .map_err(|e| ApiError::invalid_request(format!("Failed to encode request body: {e}")))?;
            descriptor = descriptor.with_body(RequestBody::Json(value));
        }
        self.send(descriptor).await
    }

    pub fn set_base_url(&self, base_url: impl Into<String>) {
        self.inner.set_base_url(base_url.into());
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.set_timeout(timeout);
    }

    pub fn config(&self) -> ClientConfig {
        let settings = self.inner.settings();
        let retry = self.inner.retry_policy();
        ClientConfig {
            base_url: settings.base_url,
            timeout: settings.timeout,
            enable_logging: self.inner.enable_logging(),
            retry_attempts: retry.max_retries,
            retry_delay: retry.base_delay,
        }
    }

    /// Credential store shared with the refresh logic.
    pub fn credentials(&self) -> &CredentialStore {
        self.inner.store()
    }

    /// Whether a token refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh().is_refreshing()
    }

    /// Tear down: stop attaching credentials, stop intercepting `401`s and
    /// clear in-flight refresh state. Requests still dispatch and retry.
    pub fn destroy(&self) {
        self.inner.detach();
    }
}

fn decode<T: DeserializeOwned>(response: &TransportResponse) -> Result<T, ApiError> {
    let body = response.body.clone().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(body).map_err(|e| ApiError::decode(response, e))
}
