//! Tether — authenticated HTTP API client.
//!
//! Wraps outbound JSON API calls with bearer-token attachment, a single-flight
//! token refresh on `401 Unauthorized`, exponential-backoff retries for
//! transport failures and `5xx` responses, and one normalized error type.
//!
//! # Quick Start
//!
//! ```no_run
//! use tether::prelude::*;
//!
//! # async fn example() -> Result<(), ApiError> {
//! let client = ApiClient::with_store(
//!     ClientOptions::new("https://api.example.com"),
//!     CredentialStore::in_memory(),
//! );
//! let profile: serde_json::Value = client.get("/me", RequestOptions::default()).await?;
//! println!("{profile}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod prelude;
pub mod transport;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
