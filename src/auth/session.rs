//! Login/logout over the credential store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SessionError;
use super::store::{CredentialKey, CredentialStore};
use crate::client::{ApiClient, RequestOptions};

/// Tokens and user record returned by a login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(alias = "refreshToken", default)]
    pub refresh_token: Option<String>,
    /// Opaque to this crate.
    #[serde(default)]
    pub user: Option<Value>,
}

/// Explicit login/logout operations owned by the caller.
///
/// These are the only writers of the credential store besides the refresh
/// coordinator.
#[derive(Debug, Clone)]
pub struct SessionManager {
    client: ApiClient,
}

impl SessionManager {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn store(&self) -> &CredentialStore {
        self.client.credentials()
    }

    /// Post `credentials` to `endpoint` and persist the returned tokens and user.
    pub async fn login<C: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        credentials: &C,
    ) -> Result<LoginResponse, SessionError> {
        let raw: Value = self
            .client
            .post(endpoint, Some(credentials), RequestOptions::default())
            .await?;
        let login: LoginResponse = serde_json::from_value(raw)
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))?;

        let store = self.store();
        store.set_token(CredentialKey::AccessToken, &login.access_token)?;
        match login.refresh_token.as_deref() {
            Some(refresh) => store.set_token(CredentialKey::RefreshToken, refresh)?,
            None => store.remove_token(CredentialKey::RefreshToken)?,
        }
        match &login.user {
            Some(user) => store.set_token(CredentialKey::User, &user.to_string())?,
            None => store.remove_token(CredentialKey::User)?,
        }
        tracing::info!("login succeeded");
        Ok(login)
    }

    /// Forget every stored credential.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.store().clear_all()?;
        Ok(())
    }

    pub fn is_authenticated(&self) -> Result<bool, SessionError> {
        Ok(self.store().get_token(CredentialKey::AccessToken)?.is_some())
    }

    /// Cached user record from the last login.
    pub fn current_user(&self) -> Result<Option<Value>, SessionError> {
        let Some(raw) = self.store().get_token(CredentialKey::User)? else {
            return Ok(None);
        };
        let user = serde_json::from_str(&raw)
            .map_err(|e| SessionError::InvalidResponse(format!("cached user record: {e}")))?;
        Ok(Some(user))
    }
}
