//! OAuth 2.0 authorization-code flow against the external document host.
//!
//! Flow:
//! 1. User hits GET /oauth/authorize → redirect to the host's authorization page
//! 2. User approves on the host's site
//! 3. Host redirects to GET /oauth/callback with `code` and `state`
//! 4. State is consumed (single-use), code is exchanged for an app credential
//! 5. Credential is sealed and stored; the sync worker can now act for the user
//!
//! The state token is consumed before any credential write, so a disconnect
//! racing a callback can only land strictly before or after the upsert.

mod exchange;
mod session;

pub use session::{run_session_sweeper, OAuthSession, SessionStore};

use crate::config::HostConfig;
use crate::credentials::{CredentialStore, UserCredential};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// OAuth flow errors.
#[derive(Debug)]
pub enum OAuthError {
    /// Host endpoint or client configuration is missing
    NotConfigured(String),
    /// State token missing, expired, or already consumed (CSRF/replay defense)
    InvalidState,
    /// Host's token endpoint rejected the exchange; user must restart the flow
    ExchangeFailed(String),
    /// Credential store I/O failure
    Persistence(String),
}

impl std::fmt::Display for OAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuthError::NotConfigured(msg) => write!(f, "OAuth not configured: {}", msg),
            OAuthError::InvalidState => write!(f, "Invalid or expired OAuth state"),
            OAuthError::ExchangeFailed(msg) => write!(f, "Token exchange failed: {}", msg),
            OAuthError::Persistence(msg) => write!(f, "Credential store failure: {}", msg),
        }
    }
}

impl std::error::Error for OAuthError {}

/// Drives the authorization-code flow and credential revocation.
///
/// Host endpoints and client identity are injected at construction; there is
/// no ambient configuration lookup.
pub struct OAuthFlow {
    host: HostConfig,
    sessions: SessionStore,
    store: Arc<CredentialStore>,
    http_timeout: Duration,
}

impl OAuthFlow {
    pub fn new(
        host: HostConfig,
        sessions: SessionStore,
        store: Arc<CredentialStore>,
        http_timeout: Duration,
    ) -> Self {
        Self {
            host,
            sessions,
            store,
            http_timeout,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Starts an authorization attempt for `user_id`.
    ///
    /// Returns the host authorization URL to redirect the user to, embedding a
    /// fresh single-use state token and `redirect_uri`.
    pub fn initiate(&self, user_id: &str, redirect_uri: &str) -> Result<String, OAuthError> {
        let authorize_url = self.host.authorize_url.as_deref().ok_or_else(|| {
            OAuthError::NotConfigured("authorization endpoint not set".to_string())
        })?;
        let client_id = self
            .host
            .client_id
            .as_deref()
            .ok_or_else(|| OAuthError::NotConfigured("client_id not set".to_string()))?;

        let state = self.sessions.begin(user_id, redirect_uri);

        info!(user_id = %user_id, "Redirecting to document host for authorization");

        Ok(build_authorize_url(
            authorize_url,
            client_id,
            redirect_uri,
            &self.host.scopes,
            &state,
        ))
    }

    /// Completes an authorization attempt.
    ///
    /// Consumes the state token first; a replayed or unknown state yields
    /// [`OAuthError::InvalidState`] with no credential side effect. On a valid
    /// session the code is exchanged (bounded timeout, no store lock held) and
    /// a `Connected` credential is upserted.
    pub async fn callback(&self, state: &str, code: &str) -> Result<UserCredential, OAuthError> {
        let session = self.sessions.consume(state).ok_or_else(|| {
            warn!("OAuth callback with invalid or expired state");
            OAuthError::InvalidState
        })?;

        debug!(user_id = %session.user_id, "OAuth state validated");

        let (token_url, client_id, client_secret) = self.client_config()?;
        let server_url = self.host.server_url.as_deref().ok_or_else(|| {
            OAuthError::NotConfigured("document host server_url not set".to_string())
        })?;

        let secret = exchange::exchange_code(
            &token_url,
            code,
            &session.redirect_uri,
            &client_id,
            &client_secret,
            self.http_timeout,
        )
        .await
        .map_err(|e| OAuthError::ExchangeFailed(format!("{:#}", e)))?;

        let credential = UserCredential::connected(&session.user_id, secret, server_url);

        self.store
            .upsert(&credential)
            .map_err(|e| OAuthError::Persistence(format!("{:#}", e)))?;

        info!(user_id = %session.user_id, "OAuth flow completed, credential stored");

        Ok(credential)
    }

    /// Revokes and deletes the credential for `user_id`.
    ///
    /// The host is notified best-effort (one retry); a failed notification is
    /// logged at warn level and never blocks local deletion. No-op if the user
    /// has no credential.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), OAuthError> {
        let credential = self
            .store
            .get(user_id)
            .map_err(|e| OAuthError::Persistence(format!("{:#}", e)))?;

        let Some(credential) = credential else {
            debug!(user_id = %user_id, "Disconnect with no stored credential, nothing to do");
            return Ok(());
        };

        if let Some(revoke_url) = self.host.revoke_url.as_deref() {
            if let (Some(client_id), Some(client_secret)) =
                (self.host.client_id.as_deref(), self.host.client_secret.as_deref())
            {
                if let Err(e) = exchange::notify_revoked(
                    revoke_url,
                    &credential.secret,
                    client_id,
                    client_secret,
                    self.http_timeout,
                )
                .await
                {
                    warn!(user_id = %user_id, error = %e, "Revoke notification failed, deleting locally anyway");
                }
            }
        }

        self.store
            .delete(user_id)
            .map_err(|e| OAuthError::Persistence(format!("{:#}", e)))?;

        info!(user_id = %user_id, "Credential revoked and deleted");

        Ok(())
    }

    fn client_config(&self) -> Result<(String, String, String), OAuthError> {
        let token_url = self
            .host
            .token_url
            .clone()
            .ok_or_else(|| OAuthError::NotConfigured("token endpoint not set".to_string()))?;
        let client_id = self
            .host
            .client_id
            .clone()
            .ok_or_else(|| OAuthError::NotConfigured("client_id not set".to_string()))?;
        let client_secret = self
            .host
            .client_secret
            .clone()
            .ok_or_else(|| OAuthError::NotConfigured("client_secret not set".to_string()))?;

        Ok((token_url, client_id, client_secret))
    }
}

/// Builds the host authorization URL for the code grant.
fn build_authorize_url(
    authorize_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> String {
    let scopes = scopes.join(" ");
    format!(
        "{}?client_id={}&redirect_uri={}&scope={}&state={}&response_type=code",
        authorize_url,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes),
        urlencoding::encode(state)
    )
}
