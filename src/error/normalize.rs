//! Conversion of raw transport/server failures into [`ApiError`].

use serde_json::Value;

use super::{ApiError, ErrorCategory};
use crate::transport::{TransportError, TransportResponse};

const MESSAGE_SEPARATOR: &str = ", ";

/// A failed attempt before it is surfaced to the caller.
#[derive(Debug, Clone)]
pub enum RawFailure {
    /// A response arrived with a non-2xx status.
    Status(TransportResponse),
    /// No response was received.
    Transport(TransportError),
}

impl RawFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(response) => Some(response.status),
            Self::Transport(_) => None,
        }
    }

    /// Transport failures and `5xx` responses are retryable; cancellation,
    /// unbuildable requests and every `4xx` are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status(response) => (500..600).contains(&response.status),
            Self::Transport(TransportError::Network(_) | TransportError::Timeout(_)) => true,
            Self::Transport(TransportError::Cancelled | TransportError::InvalidRequest(_)) => {
                false
            }
        }
    }
}

/// Normalize a failure.
///
/// Message priority: server-provided `message`/`error`, then
/// `override_message`, then a synthesized `"<status> <statusText>"` (or the
/// transport failure description). Status, status text and payload are
/// attached whenever a response exists.
pub fn normalize(failure: &RawFailure, override_message: Option<&str>) -> ApiError {
    match failure {
        RawFailure::Status(response) => {
            let message = response
                .body
                .as_ref()
                .and_then(server_message)
                .or_else(|| override_message.map(str::to_string))
                .unwrap_or_else(|| synthesize(response));
            ApiError::new(
                message,
                Some(response.status),
                response.status_text(),
                response.body.clone(),
            )
        }
        RawFailure::Transport(error) => {
            let message = override_message
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            let category = match error {
                TransportError::Cancelled => ErrorCategory::Cancelled,
                TransportError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
                TransportError::Network(_) | TransportError::Timeout(_) => {
                    ErrorCategory::Transport
                }
            };
            ApiError::new(message, None, None, None).with_category(category)
        }
    }
}

/// Extract a human-readable message from a server error payload.
pub(crate) fn server_message(payload: &Value) -> Option<String> {
    let from_message = match payload.get("message") {
        Some(Value::String(message)) if !message.is_empty() => Some(message.clone()),
        Some(Value::Array(items)) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join(MESSAGE_SEPARATOR))
        }
        _ => None,
    };
    from_message.or_else(|| match payload.get("error") {
        Some(Value::String(error)) if !error.is_empty() => Some(error.clone()),
        _ => None,
    })
}

fn synthesize(response: &TransportResponse) -> String {
    match response.status_text() {
        Some(text) => format!("{} {}", response.status, text),
        None => response.status.to_string(),
    }
}
