//! `reqwest`-backed transport and shared header helpers.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::multipart;

use super::progress::{ProgressFn, ProgressTracker};
use crate::util::timeout::is_bounded;
use super::{
    parse_body, FormData, FormPart, RequestBody, Transport, TransportError, TransportRequest,
    TransportResponse,
};

const UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .default_headers(default_headers())
            .build()
            .unwrap_or_default()
    })
}

/// Headers sent with every request.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Build an `Authorization: Bearer` header value.
pub fn bearer_value(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// Insert or replace the bearer token on a header map.
pub fn set_bearer(headers: &mut HeaderMap, token: &str) {
    if let Some(value) = bearer_value(token) {
        headers.insert(AUTHORIZATION, value);
    }
}

/// Production transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: shared_client().clone(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if is_bounded(timeout) {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Form(form)) => {
                builder.multipart(build_multipart(form, request.on_upload_progress)?)
            }
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let raw = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: parse_body(&raw),
        })
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout.as_millis() as u64)
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

fn build_multipart(
    form: FormData,
    on_progress: Option<ProgressFn>,
) -> Result<multipart::Form, TransportError> {
    let tracker = on_progress.map(|sink| Arc::new(ProgressTracker::new(form.upload_len(), sink)));
    let mut out = multipart::Form::new();

    for part in form.parts().iter().cloned() {
        out = match part {
            FormPart::Text { name, value } => out.text(name, value),
            FormPart::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                let len = data.len() as u64;
                let body = match &tracker {
                    Some(tracker) => progress_body(data, tracker.clone()),
                    None => reqwest::Body::from(data),
                };
                let mut file_part = multipart::Part::stream_with_length(body, len).file_name(file_name);
                if let Some(content_type) = content_type {
                    file_part = file_part
                        .mime_str(&content_type)
                        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                }
                out.part(name, file_part)
            }
        };
    }

    Ok(out)
}

/// Stream `data` in chunks, reporting each chunk as it is pulled by the connection.
fn progress_body(data: Bytes, tracker: Arc<ProgressTracker>) -> reqwest::Body {
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
        .collect();
    let stream = stream::iter(chunks).map(move |chunk| {
        tracker.advance(chunk.len() as u64);
        Ok::<_, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    #[test]
    fn set_bearer_replaces_existing_value() {
        let mut headers = HeaderMap::new();
        set_bearer(&mut headers, "old");
        set_bearer(&mut headers, "new");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer new");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[test]
    fn default_headers_accept_json() {
        let headers = default_headers();
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn timeout_errors_keep_configured_duration() {
        let err = TransportError::Timeout(Duration::from_secs(30).as_millis() as u64);
        assert_eq!(err.to_string(), "Request timed out after 30000ms");
    }
}
