//! Background-sync credential API.
//!
//! Stores directly-supplied app passwords, reports credential metadata and
//! sync status. Secret material never leaves this surface: metadata responses
//! carry status and timestamps only.

use super::{current_user, ApiError};
use crate::credentials::{CredentialStatus, CredentialStore, UserCredential};
use crate::status::{StatusAggregator, SyncStatus};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state for the background-sync API.
#[derive(Clone)]
pub struct SyncAppState {
    pub store: Arc<CredentialStore>,
    pub aggregator: Arc<StatusAggregator>,
    pub auth_enabled: bool,
}

/// Request body for POST /api/v1/background-sync/credentials
#[derive(Deserialize)]
pub struct StoreCredentialRequest {
    pub server_url: String,
    pub app_password: String,
}

#[derive(Serialize)]
pub struct StoreCredentialResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct DeleteCredentialResponse {
    pub success: bool,
    /// Whether a credential actually existed
    pub deleted: bool,
}

/// Credential metadata. Secret material is deliberately absent.
#[derive(Serialize)]
pub struct CredentialMetadata {
    pub user_id: String,
    pub server_url: String,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validated_at: Option<DateTime<Utc>>,
}

impl From<UserCredential> for CredentialMetadata {
    fn from(c: UserCredential) -> Self {
        Self {
            user_id: c.user_id,
            server_url: c.server_url,
            status: c.status,
            created_at: c.created_at,
            last_validated_at: c.last_validated_at,
        }
    }
}

/// Create the background-sync API router.
pub fn create_sync_router(state: SyncAppState) -> Router {
    Router::new()
        .route("/api/v1/background-sync/credentials", post(store_credential))
        .route("/api/v1/background-sync/credentials", delete(delete_credential))
        .route(
            "/api/v1/background-sync/credentials/:user_id",
            get(get_credential_metadata),
        )
        .route("/api/v1/background-sync/status", get(get_status))
        .with_state(Arc::new(state))
}

/// POST /api/v1/background-sync/credentials
///
/// Stores a directly-supplied app password for the current user. Upsert:
/// an existing credential is replaced, never duplicated.
async fn store_credential(
    State(state): State<Arc<SyncAppState>>,
    headers: HeaderMap,
    Json(body): Json<StoreCredentialRequest>,
) -> Result<Json<StoreCredentialResponse>, ApiError> {
    let user_id = current_user(&headers, state.auth_enabled)?;

    if body.app_password.is_empty() {
        return Err(ApiError::BadRequest("app_password must not be empty".to_string()));
    }

    let credential = UserCredential::connected(&user_id, body.app_password, &body.server_url);
    state.store.upsert(&credential)?;

    info!(user_id = %user_id, "App-password credential stored");

    Ok(Json(StoreCredentialResponse { success: true }))
}

/// GET /api/v1/background-sync/credentials/:user_id
///
/// Returns credential metadata, never secret material. 404 when the user has
/// no credential.
async fn get_credential_metadata(
    State(state): State<Arc<SyncAppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<CredentialMetadata>, ApiError> {
    debug!(user_id = %user_id, "Credential metadata requested");

    let credential = state
        .store
        .get(&user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("No credential for user '{}'", user_id)))?;

    Ok(Json(CredentialMetadata::from(credential)))
}

/// DELETE /api/v1/background-sync/credentials
///
/// Deletes the current user's credential. Idempotent: succeeds when nothing
/// was stored.
async fn delete_credential(
    State(state): State<Arc<SyncAppState>>,
    headers: HeaderMap,
) -> Result<Json<DeleteCredentialResponse>, ApiError> {
    let user_id = current_user(&headers, state.auth_enabled)?;

    let deleted = state.store.delete(&user_id)?;

    info!(user_id = %user_id, deleted, "Credential delete requested");

    Ok(Json(DeleteCredentialResponse {
        success: true,
        deleted,
    }))
}

/// GET /api/v1/background-sync/status
///
/// Returns the aggregated sync status for the current user. Never hard-fails
/// on host unreachability; see [`StatusAggregator`].
async fn get_status(
    State(state): State<Arc<SyncAppState>>,
    headers: HeaderMap,
) -> Result<Json<SyncStatus>, ApiError> {
    let user_id = current_user(&headers, state.auth_enabled)?;

    let status = state.aggregator.get_status(&user_id).await?;

    Ok(Json(status))
}
