//! Token refresh functions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::error::RefreshError;
use super::store::{CredentialKey, CredentialStore};
use crate::transport::{RequestBody, Transport, TransportRequest};

/// Obtains a fresh access token.
///
/// The client calls this at most once at a time, no matter how many requests
/// are waiting on a `401`.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<String, RefreshError>;
}

struct FnRefresher<F>(F);

#[async_trait]
impl<F, Fut> TokenRefresher for FnRefresher<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, RefreshError>> + Send,
{
    async fn refresh(&self) -> Result<String, RefreshError> {
        (self.0)().await
    }
}

/// Adapt an async closure into a [`TokenRefresher`].
///
/// # Example
/// ```
/// use tether::auth::refresh_fn;
///
/// let refresher = refresh_fn(|| async { Ok("new-access-token".to_string()) });
/// ```
pub fn refresh_fn<F, Fut>(f: F) -> Arc<dyn TokenRefresher>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, RefreshError>> + Send + 'static,
{
    Arc::new(FnRefresher(f))
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token", rename = "accessToken")]
    access_token: String,
    #[serde(alias = "refresh_token", rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

/// Exchanges the stored refresh token at an HTTP endpoint.
///
/// Sends `POST {"refreshToken": "<stored>"}` and expects `accessToken`
/// (or `access_token`) back. A rotated refresh token in the response
/// replaces the stored one.
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    url: String,
    store: CredentialStore,
    timeout: Duration,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, store: CredentialStore) -> Self {
        Self {
            transport,
            url: url.into(),
            store,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self) -> Result<String, RefreshError> {
        let refresh_token = self
            .store
            .get_token(CredentialKey::RefreshToken)?
            .ok_or_else(|| RefreshError::Rejected("no refresh token stored".to_string()))?;

        let response = self
            .transport
            .send(TransportRequest {
                method: Method::POST,
                url: self.url.clone(),
                headers: HeaderMap::new(),
                body: Some(RequestBody::Json(json!({ "refreshToken": refresh_token }))),
                timeout: self.timeout,
                on_upload_progress: None,
            })
            .await?;

        if !response.is_success() {
            return Err(RefreshError::Rejected(format!(
                "refresh endpoint returned {}",
                response.status
            )));
        }

        let body = response
            .body
            .ok_or_else(|| RefreshError::InvalidResponse("empty body".to_string()))?;
        let parsed: RefreshResponse = serde_json::from_value(body)?;
        if let Some(rotated) = parsed.refresh_token.as_deref() {
            self.store.set_token(CredentialKey::RefreshToken, rotated)?;
        }
        Ok(parsed.access_token)
    }
}
