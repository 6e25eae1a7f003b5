//! Credential storage, token refresh and session management.

pub mod error;
pub mod refresh;
pub mod refresher;
pub mod session;
pub mod store;

pub use error::{RefreshError, SessionError, StorageError};
pub use refresh::{RefreshCoordinator, SESSION_EXPIRED};
pub use refresher::{refresh_fn, HttpTokenRefresher, TokenRefresher};
pub use session::{LoginResponse, SessionManager};
pub use store::{
    CredentialKey, CredentialStore, FileBackend, MemoryBackend, StorageBackend, StorageKind,
};
