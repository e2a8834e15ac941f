//! Token exchange and revocation against the document host.
//!
//! Both calls are bounded by a timeout and run without holding any store
//! lock. Error text never includes token material.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Standard OAuth 2.0 token response.
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Exchanges an authorization code for the app credential.
///
/// # Arguments
/// * `token_url` - Host's token endpoint
/// * `code` - Authorization code from the callback
/// * `redirect_uri` - Must match the one sent on initiate
/// * `client_id` / `client_secret` - This application's OAuth client
/// * `timeout` - Upper bound on the whole request
///
/// Not retried: a failed exchange is surfaced and the user restarts the flow.
pub async fn exchange_code(
    token_url: &str,
    code: &str,
    redirect_uri: &str,
    client_id: &str,
    client_secret: &str,
    timeout: Duration,
) -> Result<String> {
    let client = reqwest::Client::new();

    let mut form = HashMap::new();
    form.insert("grant_type", "authorization_code");
    form.insert("code", code);
    form.insert("redirect_uri", redirect_uri);
    form.insert("client_id", client_id);
    form.insert("client_secret", client_secret);

    tracing::debug!(token_url = %token_url, "Exchanging authorization code");

    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .timeout(timeout)
        .form(&form)
        .send()
        .await
        .context("Token exchange request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow!("Token endpoint returned {}: {}", status, body));
    }

    let token: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    tracing::debug!(
        token_type = ?token.token_type,
        expires_in = ?token.expires_in,
        "Token exchange successful"
    );

    Ok(token.access_token)
}

/// Best-effort revoke notification to the host.
///
/// One immediate retry on failure; revocation is idempotent on the host side.
/// Returns `Err` only after both attempts fail, so the caller can log a
/// warning. Local credential deletion never waits on this outcome.
pub async fn notify_revoked(
    revoke_url: &str,
    token: &str,
    client_id: &str,
    client_secret: &str,
    timeout: Duration,
) -> Result<()> {
    let mut last_err = None;

    for attempt in 1..=2 {
        match send_revoke(revoke_url, token, client_id, client_secret, timeout).await {
            Ok(()) => {
                tracing::debug!(attempt, "Revoke notification accepted");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "Revoke notification attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("Revoke notification failed")))
}

async fn send_revoke(
    revoke_url: &str,
    token: &str,
    client_id: &str,
    client_secret: &str,
    timeout: Duration,
) -> Result<()> {
    let client = reqwest::Client::new();

    let mut form = HashMap::new();
    form.insert("token", token);
    form.insert("client_id", client_id);
    form.insert("client_secret", client_secret);

    let response = client
        .post(revoke_url)
        .timeout(timeout)
        .form(&form)
        .send()
        .await
        .context("Revoke request failed")?;

    if !response.status().is_success() {
        // Status only; the body could echo the token back
        return Err(anyhow!("Revocation endpoint returned {}", response.status()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "app-pw-1234567890",
            "expires_in": 3600,
            "token_type": "Bearer"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "app-pw-1234567890");
        assert_eq!(response.expires_in, Some(3600));
        assert_eq!(response.token_type, Some("Bearer".to_string()));
    }

    #[test]
    fn test_token_response_minimal() {
        let json = r#"{"access_token": "token_12345"}"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "token_12345");
        assert_eq!(response.expires_in, None);
        assert_eq!(response.token_type, None);
    }

    #[tokio::test]
    async fn test_exchange_against_mock_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "granted-pw"}"#)
            .create_async()
            .await;

        let token = exchange_code(
            &format!("{}/oauth/token", server.url()),
            "code123",
            "https://app.example.com/oauth/callback",
            "client-id",
            "client-secret",
            Duration::from_secs(5),
        )
        .await
        .expect("exchange should succeed");

        assert_eq!(token, "granted-pw");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_rejection_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;

        let result = exchange_code(
            &format!("{}/oauth/token", server.url()),
            "bad-code",
            "https://app.example.com/oauth/callback",
            "client-id",
            "client-secret",
            Duration::from_secs(5),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_revoke_success_does_not_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/revoke")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let result = notify_revoked(
            &format!("{}/oauth/revoke", server.url()),
            "stored-token",
            "client-id",
            "client-secret",
            Duration::from_secs(5),
        )
        .await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_revoke_gives_up_after_two_attempts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/revoke")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let result = notify_revoked(
            &format!("{}/oauth/revoke", server.url()),
            "stored-token",
            "client-id",
            "client-secret",
            Duration::from_secs(5),
        )
        .await;

        assert!(result.is_err());
        // Error text never contains the token
        assert!(!format!("{:#}", result.unwrap_err()).contains("stored-token"));
        mock.assert_async().await;
    }
}
