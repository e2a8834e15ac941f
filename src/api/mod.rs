//! HTTP surface: routers, shared error mapping, request-user resolution.

pub mod oauth;
pub mod settings;
pub mod sync;
pub mod webhooks;

pub use oauth::{create_oauth_router, OAuthAppState};
pub use settings::{create_settings_router, SettingsAppState};
pub use sync::{create_sync_router, SyncAppState};
pub use webhooks::{create_webhook_router, WebhookAppState};

use crate::auth::{extract_user, TokenError, DEFAULT_USER};
use crate::oauth::OAuthError;
use crate::settings::SettingsError;
use crate::webhooks::PresetError;
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Error body returned by every endpoint.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// API-level error mapped onto HTTP status codes.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    ServerError(String),
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<OAuthError> for ApiError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::NotConfigured(_) => ApiError::ServerError(e.to_string()),
            OAuthError::InvalidState => ApiError::Unauthorized(e.to_string()),
            OAuthError::ExchangeFailed(_) => ApiError::BadGateway(e.to_string()),
            OAuthError::Persistence(_) => ApiError::ServerError(e.to_string()),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::UnknownField(_) => ApiError::NotFound(e.to_string()),
            SettingsError::Persistence(_) => ApiError::ServerError(e.to_string()),
        }
    }
}

impl From<PresetError> for ApiError {
    fn from(e: PresetError) -> Self {
        match e {
            PresetError::UnknownPreset(_) => ApiError::NotFound(e.to_string()),
            PresetError::Persistence(_) => ApiError::ServerError(e.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        ApiError::Unauthorized(e.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::ServerError(format!("{:#}", e))
    }
}

/// Resolves the acting user for a request.
///
/// With auth enabled the bearer token carries the user id; otherwise the
/// request acts as the `default` user.
pub(crate) fn current_user(headers: &HeaderMap, auth_enabled: bool) -> Result<String, ApiError> {
    if auth_enabled {
        Ok(extract_user(headers)?)
    } else {
        Ok(DEFAULT_USER.to_string())
    }
}
