//! Error types for Tether.

pub mod normalize;
pub mod unified;

pub use normalize::{normalize, RawFailure};
pub use unified::ErrorCategory;

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportResponse;

/// The single error shape every terminal request failure is converted into.
///
/// Callers distinguish failure kinds by [`ApiError::status`] or
/// [`ApiError::category`], never by matching on different error types.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ApiError {
    message: String,
    status: Option<u16>,
    status_text: Option<String>,
    data: Option<Value>,
    category: ErrorCategory,
}

impl ApiError {
    /// Create an error whose category is derived from the status code.
    pub fn new(
        message: impl Into<String>,
        status: Option<u16>,
        status_text: Option<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            message: message.into(),
            status,
            status_text,
            data,
            category: ErrorCategory::from_status(status),
        }
    }

    pub(crate) fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    /// A request that could not be built (bad body, bad header) before dispatch.
    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(message, None, None, None).with_category(ErrorCategory::InvalidRequest)
    }

    /// A 2xx response whose body did not match the expected type.
    pub(crate) fn decode(response: &TransportResponse, error: serde_json::Error) -> Self {
        Self::new(
            format!("Failed to decode response body: {error}"),
            Some(response.status),
            response.status_text(),
            response.body.clone(),
        )
        .with_category(ErrorCategory::Decode)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, absent when no response was received.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    /// Raw server payload, when one was received.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Whether the failure kind is one the pipeline retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::Transport | ErrorCategory::Server
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        self.category == ErrorCategory::Authentication
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ApiError>;
