//! Browser-facing OAuth endpoints.
//!
//! `/oauth/authorize` and `/oauth/callback` are redirect endpoints driven by
//! the user's browser; `/oauth/disconnect` is a JSON endpoint used by the
//! settings page. Callback failures redirect to the settings return page
//! rather than rendering an error body, so the user always lands somewhere
//! navigable.

use super::{current_user, ApiError};
use crate::oauth::OAuthFlow;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state for the OAuth endpoints.
#[derive(Clone)]
pub struct OAuthAppState {
    pub flow: Arc<OAuthFlow>,
    pub auth_enabled: bool,
    /// Public base URL of this service (callback URL construction)
    pub callback_base_url: String,
    /// Settings page the browser is sent back to after the callback
    pub settings_return_url: String,
}

/// Query parameters delivered by the host on callback.
#[derive(Deserialize)]
pub struct OAuthCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Serialize)]
pub struct DisconnectResponse {
    pub success: bool,
}

/// Create the OAuth router.
pub fn create_oauth_router(state: OAuthAppState) -> Router {
    Router::new()
        .route("/oauth/authorize", get(oauth_authorize))
        .route("/oauth/callback", get(oauth_callback))
        .route("/oauth/disconnect", post(oauth_disconnect))
        .with_state(Arc::new(state))
}

/// GET /oauth/authorize
///
/// Starts the flow: 302 to the document host's authorization page with a
/// fresh single-use state token.
async fn oauth_authorize(
    State(state): State<Arc<OAuthAppState>>,
    headers: HeaderMap,
) -> Result<Redirect, ApiError> {
    let user_id = current_user(&headers, state.auth_enabled)?;

    let redirect_uri = format!("{}/oauth/callback", state.callback_base_url);
    let auth_url = state.flow.initiate(&user_id, &redirect_uri)?;

    Ok(Redirect::temporary(&auth_url))
}

/// GET /oauth/callback
///
/// Completes the flow and 302s to the settings page with `connect=ok` or
/// `connect=error`. The state token is consumed on every path through here,
/// so a replayed callback cannot mint a second credential.
async fn oauth_callback(
    State(state): State<Arc<OAuthAppState>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Redirect {
    let return_to = |outcome: &str| {
        Redirect::temporary(&format!(
            "{}?connect={}",
            state.settings_return_url, outcome
        ))
    };

    if let Some(error) = query.error {
        warn!(
            error = %error,
            description = %query.error_description.unwrap_or_default(),
            "Host reported authorization failure"
        );
        return return_to("error");
    }

    let (Some(code), Some(csrf_state)) = (query.code, query.state) else {
        warn!("OAuth callback missing code or state parameter");
        return return_to("error");
    };

    match state.flow.callback(&csrf_state, &code).await {
        Ok(credential) => {
            info!(user_id = %credential.user_id, "OAuth connection established");
            return_to("ok")
        }
        Err(e) => {
            warn!(error = %e, "OAuth callback failed");
            return_to("error")
        }
    }
}

/// POST /oauth/disconnect
///
/// Revokes (best-effort) and deletes the current user's credential.
async fn oauth_disconnect(
    State(state): State<Arc<OAuthAppState>>,
    headers: HeaderMap,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let user_id = current_user(&headers, state.auth_enabled)?;

    state.flow.disconnect(&user_id).await?;

    Ok(Json(DisconnectResponse { success: true }))
}
