use thiserror::Error;

use crate::error::ApiError;
use crate::transport::TransportError;

/// Credential storage failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The backend cannot be used at all, as opposed to one failed operation.
    /// `FileBackend` reports this when its directory is not a directory;
    /// custom [`StorageBackend`](super::StorageBackend) implementations use it
    /// to fail the availability probe.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<toml::de::Error> for StorageError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for StorageError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Failure of a token refresh function.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Refresh rejected: {0}")]
    Rejected(String),
    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),
    #[error("Network error during refresh: {0}")]
    Network(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<TransportError> for RefreshError {
    fn from(error: TransportError) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for RefreshError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

/// Login/logout failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Invalid login response: {0}")]
    InvalidResponse(String),
}
