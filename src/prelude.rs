//! Convenience re-exports for common use.

pub use crate::auth::{
    refresh_fn, CredentialKey, CredentialStore, HttpTokenRefresher, SessionManager, StorageKind,
    TokenRefresher,
};
pub use crate::client::{ApiClient, RequestOptions};
pub use crate::config::ClientOptions;
pub use crate::error::{ApiError, ErrorCategory};
pub use crate::transport::{FormData, ProgressFn, Transport};
pub use tokio_util::sync::CancellationToken;
