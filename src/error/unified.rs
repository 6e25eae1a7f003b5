//! Error classification.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No response was received (network down, DNS, timeout).
    Transport,
    /// `401 Unauthorized`, or a failed token refresh.
    Authentication,
    /// Any other `4xx`.
    Client,
    /// `5xx`.
    Server,
    /// The caller cancelled the request.
    Cancelled,
    /// A successful response whose body could not be deserialized.
    Decode,
    /// The request could not be built.
    InvalidRequest,
    /// A status outside the ranges above (e.g. an unexpected `3xx`).
    Unknown,
}

impl ErrorCategory {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            None => Self::Transport,
            Some(401) => Self::Authentication,
            Some(400..=499) => Self::Client,
            Some(500..=599) => Self::Server,
            Some(_) => Self::Unknown,
        }
    }
}
