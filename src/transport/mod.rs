//! HTTP dispatch primitive consumed by the request pipeline.

pub mod http;
pub mod progress;

pub use http::ReqwestTransport;
pub use progress::{ProgressFn, ProgressTracker};

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

/// Failure where no HTTP response was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// One outbound HTTP call.
#[derive(Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
    pub on_upload_progress: Option<ProgressFn>,
}

impl std::fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("on_upload_progress", &self.on_upload_progress.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Form(FormData),
}

/// A response with any status code.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    /// Parsed JSON body. Non-JSON text is carried as a JSON string; an empty
    /// body is `None`.
    pub body: Option<Value>,
}

impl TransportResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            status_text,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Status text, or `None` when the server sent none.
    pub fn status_text(&self) -> Option<String> {
        (!self.status_text.is_empty()).then(|| self.status_text.clone())
    }
}

/// Parse a raw response body the way the pipeline expects.
pub fn parse_body(raw: &[u8]) -> Option<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(raw) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(raw).into_owned())),
    }
}

/// Dispatches HTTP requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Multipart form payload for uploads.
///
/// # Example
/// ```
/// use tether::transport::FormData;
///
/// let form = FormData::new()
///     .text("title", "holiday")
///     .file("photo", "beach.jpg", Some("image/jpeg"), vec![0u8; 16]);
/// assert_eq!(form.upload_len(), 16);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormData {
    parts: Vec<FormPart>,
}

#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: Option<String>,
        data: Bytes,
    },
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<&str>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            data: data.into(),
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Bytes of file content; progress is reported against this total.
    pub fn upload_len(&self) -> u64 {
        self.parts
            .iter()
            .map(|part| match part {
                FormPart::File { data, .. } => data.len() as u64,
                FormPart::Text { .. } => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_body_handles_json_text_and_empty() {
        assert_eq!(parse_body(br#"{"ok":true}"#), Some(json!({ "ok": true })));
        assert_eq!(
            parse_body(b"Service Unavailable"),
            Some(json!("Service Unavailable"))
        );
        assert_eq!(parse_body(b""), None);
        assert_eq!(parse_body(b"  \n"), None);
    }

    #[test]
    fn response_new_fills_canonical_status_text() {
        let response = TransportResponse::new(503, None);
        assert_eq!(response.status_text().as_deref(), Some("Service Unavailable"));
        assert!(!response.is_success());
        assert!(TransportResponse::new(204, None).is_success());
    }
}
