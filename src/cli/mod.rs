//! CLI entry point for Tether.

pub mod auth;
pub mod request;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::auth::{CredentialStore, HttpTokenRefresher, StorageKind};
use crate::client::{join_url, ApiClient};
use crate::config::{ClientOptions, UnauthorizedFn};
use crate::transport::ReqwestTransport;

/// Tether API client CLI
#[derive(Parser, Debug)]
#[command(name = "tether", version, about = "Tether — authenticated API client CLI")]
pub struct Cli {
    /// API base URL
    #[arg(long, global = true, env = "TETHER_API_BASE_URL")]
    pub base_url: Option<String>,

    /// Endpoint used to exchange the stored refresh token
    #[arg(long, global = true, default_value = "/auth/refresh")]
    pub refresh_endpoint: String,

    /// Log requests, retries and refreshes to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the returned tokens
    Login(LoginArgs),
    /// Forget stored credentials
    Logout,
    /// Show authentication status
    Status,
    /// Send an authenticated request and print the JSON response
    Request(RequestArgs),
}

/// Arguments for `tether login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    pub username: String,

    /// Read from TETHER_PASSWORD when omitted
    #[arg(long, env = "TETHER_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long, default_value = "/auth/login")]
    pub endpoint: String,
}

/// Arguments for `tether request`.
#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Endpoint path, or an absolute URL
    pub endpoint: String,

    /// JSON request body
    #[arg(short, long)]
    pub body: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Client over the durable store, refreshing through `--refresh-endpoint`.
    pub fn client(&self) -> Result<ApiClient, Box<dyn std::error::Error>> {
        let mut options = match &self.base_url {
            Some(base_url) => ClientOptions::new(base_url.clone()),
            None => ClientOptions::from_env()?,
        };
        options.enable_logging |= self.verbose;

        let store = CredentialStore::new(StorageKind::Durable);
        let transport = Arc::new(ReqwestTransport::new());
        let refresher = HttpTokenRefresher::new(
            transport.clone(),
            join_url(&options.base_url, &self.refresh_endpoint),
            store.clone(),
        )
        .with_timeout(options.timeout);
        options.token_refresher = Some(Arc::new(refresher));
        let on_unauthorized: UnauthorizedFn =
            Arc::new(|| eprintln!("Session expired. Run `tether login` again."));
        options.on_unauthorized = Some(on_unauthorized);

        Ok(ApiClient::with_transport(options, store, transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_login_with_defaults() {
        let cli = Cli::try_parse_from(["tether", "login", "ada", "--password", "pw"]).unwrap();
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.username, "ada");
                assert_eq!(args.password, "pw");
                assert_eq!(args.endpoint, "/auth/login");
            }
            other => panic!("expected Login, got {other:?}"),
        }
        assert_eq!(cli.refresh_endpoint, "/auth/refresh");
    }

    #[test]
    fn parse_status_and_logout() {
        let cli = Cli::try_parse_from(["tether", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));
        let cli = Cli::try_parse_from(["tether", "logout"]).unwrap();
        assert!(matches!(cli.command, Commands::Logout));
    }

    #[test]
    fn parse_request_with_body_and_global_flags() {
        let cli = Cli::try_parse_from([
            "tether",
            "request",
            "post",
            "/items",
            "--body",
            r#"{"name":"x"}"#,
            "--base-url",
            "http://localhost:9000",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:9000"));
        assert!(cli.verbose);
        match cli.command {
            Commands::Request(args) => {
                assert_eq!(args.method, "post");
                assert_eq!(args.endpoint, "/items");
                assert_eq!(args.body.as_deref(), Some(r#"{"name":"x"}"#));
            }
            other => panic!("expected Request, got {other:?}"),
        }
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["tether"]).is_err());
    }

    #[test]
    fn parse_request_missing_endpoint_is_error() {
        assert!(Cli::try_parse_from(["tether", "request", "get"]).is_err());
    }
}
