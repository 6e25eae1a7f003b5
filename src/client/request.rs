use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::transport::http::set_bearer;
use crate::transport::{ProgressFn, RequestBody};

/// Per-call options.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use reqwest::header::{HeaderName, HeaderValue};
/// use tether::client::RequestOptions;
/// use tokio_util::sync::CancellationToken;
///
/// let cancel = CancellationToken::new();
/// let options = RequestOptions::new()
///     .with_header(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc"))
///     .with_timeout(Duration::from_secs(5))
///     .with_cancellation(cancel.clone());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub cancel: Option<CancellationToken>,
    /// Overrides the client timeout for this call.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Everything needed to dispatch one logical request.
///
/// Immutable once dispatched: retries and replays work on copies.
#[derive(Clone)]
pub struct RequestDescriptor {
    pub(crate) method: Method,
    pub(crate) endpoint: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<RequestBody>,
    pub(crate) on_upload_progress: Option<ProgressFn>,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) timeout: Option<Duration>,
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RequestDescriptor {
    pub fn new(method: Method, endpoint: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            headers: options.headers,
            body: None,
            on_upload_progress: None,
            cancel: options.cancel,
            timeout: options.timeout,
        }
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_upload_progress(mut self, sink: ProgressFn) -> Self {
        self.on_upload_progress = Some(sink);
        self
    }

    /// Copy with `Authorization: Bearer <token>`.
    pub fn with_bearer(&self, token: &str) -> Self {
        let mut copy = self.clone();
        set_bearer(&mut copy.headers, token);
        copy
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Resolve `endpoint` against `base_url`. Absolute URLs pass through untouched.
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    if endpoint.is_empty() {
        return base_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("http://api/", "/me"), "http://api/me");
        assert_eq!(join_url("http://api", "me"), "http://api/me");
        assert_eq!(join_url("http://api/v1", "users/1"), "http://api/v1/users/1");
        assert_eq!(join_url("http://api", ""), "http://api");
    }

    #[test]
    fn join_url_keeps_absolute_endpoints() {
        assert_eq!(
            join_url("http://api", "https://other.host/x"),
            "https://other.host/x"
        );
    }

    #[test]
    fn with_bearer_copies_without_touching_original() {
        let original = RequestDescriptor::new(Method::GET, "/me", RequestOptions::default());
        let authed = original.with_bearer("abc");
        assert!(original.headers().get(AUTHORIZATION).is_none());
        assert_eq!(authed.headers().get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(authed.endpoint(), "/me");
    }
}
