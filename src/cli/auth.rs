//! CLI handlers for login, status, and logout.

use serde_json::json;

use super::{Cli, LoginArgs};
use crate::auth::{CredentialKey, SessionManager};

/// Handle `tether login <username>`.
pub async fn handle_login(cli: &Cli, args: &LoginArgs) -> Result<(), Box<dyn std::error::Error>> {
    let session = SessionManager::new(cli.client()?);
    let credentials = json!({ "username": args.username, "password": args.password });
    let login = session.login(&args.endpoint, &credentials).await?;

    println!("✅ Logged in as {}", args.username);
    if login.refresh_token.is_none() {
        println!("   No refresh token returned; the session ends when the access token expires.");
    }
    Ok(())
}

/// Handle `tether status`.
pub fn handle_status(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = cli.client()?;
    let session = SessionManager::new(client.clone());
    let store = client.credentials();

    println!("API: {}", client.config().base_url);
    if !session.is_authenticated()? {
        println!("❌ Not logged in");
        return Ok(());
    }
    println!("✅ Logged in");
    let has_refresh = store.get_token(CredentialKey::RefreshToken)?.is_some();
    println!("   Refresh token: {}", if has_refresh { "stored" } else { "none" });
    if let Some(user) = session.current_user()? {
        println!("   User: {user}");
    }
    Ok(())
}

/// Handle `tether logout`.
pub fn handle_logout(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    SessionManager::new(cli.client()?).logout()?;
    println!("✅ Logged out");
    Ok(())
}
