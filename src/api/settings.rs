//! Settings-field API.
//!
//! Thin wrapper over [`SettingsMediator`]; redaction happens in the mediator,
//! so this surface can never echo secret content regardless of field.

use super::{current_user, ApiError};
use crate::settings::SettingsMediator;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for the settings API.
#[derive(Clone)]
pub struct SettingsAppState {
    pub mediator: Arc<SettingsMediator>,
    pub auth_enabled: bool,
}

#[derive(Serialize)]
pub struct FieldResponse {
    pub field_id: String,
    pub value: String,
}

#[derive(Deserialize)]
pub struct WriteFieldRequest {
    pub value: String,
}

#[derive(Serialize)]
pub struct WriteFieldResponse {
    pub success: bool,
}

/// Create the settings API router.
pub fn create_settings_router(state: SettingsAppState) -> Router {
    Router::new()
        .route(
            "/api/v1/settings/fields/:field_id",
            get(read_field).put(write_field),
        )
        .with_state(Arc::new(state))
}

/// GET /api/v1/settings/fields/:field_id
async fn read_field(
    State(state): State<Arc<SettingsAppState>>,
    headers: HeaderMap,
    Path(field_id): Path<String>,
) -> Result<Json<FieldResponse>, ApiError> {
    let user_id = current_user(&headers, state.auth_enabled)?;

    let value = state.mediator.read_field(&user_id, &field_id)?;

    Ok(Json(FieldResponse { field_id, value }))
}

/// PUT /api/v1/settings/fields/:field_id
async fn write_field(
    State(state): State<Arc<SettingsAppState>>,
    headers: HeaderMap,
    Path(field_id): Path<String>,
    Json(body): Json<WriteFieldRequest>,
) -> Result<Json<WriteFieldResponse>, ApiError> {
    let user_id = current_user(&headers, state.auth_enabled)?;

    state.mediator.write_field(&user_id, &field_id, &body.value)?;

    Ok(Json(WriteFieldResponse { success: true }))
}
