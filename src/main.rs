//! Tether CLI binary entry point.

use tether::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "tether=debug" } else { "tether=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Login(args) => tether::cli::auth::handle_login(&cli, args).await,
        Commands::Logout => tether::cli::auth::handle_logout(&cli),
        Commands::Status => tether::cli::auth::handle_status(&cli),
        Commands::Request(args) => tether::cli::request::handle_request(&cli, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
