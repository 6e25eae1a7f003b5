//! Client configuration (code > env > defaults).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use thiserror::Error;

use crate::auth::TokenRefresher;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Called when the session cannot be recovered (typically forces a logout).
pub type UnauthorizedFn = Arc<dyn Fn() + Send + Sync>;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Options fixed at client construction.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use tether::config::ClientOptions;
///
/// let options = ClientOptions::builder()
///     .base_url("https://api.example.com")
///     .retry_attempts(5)
///     .retry_delay(Duration::from_millis(250))
///     .build();
/// assert_eq!(options.timeout, Duration::from_secs(30));
/// ```
#[derive(Clone, Builder)]
pub struct ClientOptions {
    #[builder(into)]
    pub base_url: String,
    /// Per-attempt deadline; `Duration::ZERO` disables it.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    #[builder(default)]
    pub enable_logging: bool,
    #[builder(default = DEFAULT_RETRY_ATTEMPTS)]
    pub retry_attempts: u32,
    #[builder(default = DEFAULT_RETRY_DELAY)]
    pub retry_delay: Duration,
    pub on_unauthorized: Option<UnauthorizedFn>,
    pub token_refresher: Option<Arc<dyn TokenRefresher>>,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("enable_logging", &self.enable_logging)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("on_unauthorized", &self.on_unauthorized.as_ref().map(|_| ".."))
            .field("token_refresher", &self.token_refresher.as_ref().map(|_| ".."))
            .finish()
    }
}

impl From<&str> for ClientOptions {
    fn from(base_url: &str) -> Self {
        Self::new(base_url)
    }
}

impl From<String> for ClientOptions {
    fn from(base_url: String) -> Self {
        Self::new(base_url)
    }
}

impl ClientOptions {
    /// Defaults for everything except the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::builder().base_url(base_url).build()
    }

    /// Load from environment variables (after reading `.env` if present).
    ///
    /// `TETHER_API_BASE_URL` is required; `TETHER_TIMEOUT_MS`,
    /// `TETHER_ENABLE_LOGGING`, `TETHER_RETRY_ATTEMPTS` and
    /// `TETHER_RETRY_DELAY_MS` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ClientOptions::from_env`] but over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("TETHER_API_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("TETHER_API_BASE_URL".to_string()))?;

        let mut options = Self::new(base_url);
        if let Some(ms) = parse_var::<u64>(&lookup, "TETHER_TIMEOUT_MS")? {
            options.timeout = Duration::from_millis(ms);
        }
        if let Some(enabled) = parse_flag(&lookup, "TETHER_ENABLE_LOGGING")? {
            options.enable_logging = enabled;
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, "TETHER_RETRY_ATTEMPTS")? {
            options.retry_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "TETHER_RETRY_DELAY_MS")? {
            options.retry_delay = Duration::from_millis(ms);
        }
        Ok(options)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<bool>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
        },
    }
}
