//! Admin webhook-preset API.

use super::ApiError;
use crate::webhooks::{WebhookPreset, WebhookPresetManager};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared state for the webhook-preset API.
#[derive(Clone)]
pub struct WebhookAppState {
    pub presets: Arc<WebhookPresetManager>,
}

#[derive(Serialize)]
pub struct ListPresetsResponse {
    pub presets: Vec<WebhookPreset>,
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub success: bool,
}

/// Create the webhook-preset admin router.
pub fn create_webhook_router(state: WebhookAppState) -> Router {
    Router::new()
        .route("/api/admin/webhooks/presets", get(list_presets))
        .route("/api/admin/webhooks/presets/:id/enable", post(enable_preset))
        .route("/api/admin/webhooks/presets/:id/disable", post(disable_preset))
        .with_state(Arc::new(state))
}

/// GET /api/admin/webhooks/presets
async fn list_presets(
    State(state): State<Arc<WebhookAppState>>,
) -> Result<Json<ListPresetsResponse>, ApiError> {
    let presets = state.presets.list()?;
    Ok(Json(ListPresetsResponse { presets }))
}

/// POST /api/admin/webhooks/presets/:id/enable
async fn enable_preset(
    State(state): State<Arc<WebhookAppState>>,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    state.presets.enable(&id)?;
    Ok(Json(ToggleResponse { success: true }))
}

/// POST /api/admin/webhooks/presets/:id/disable
async fn disable_preset(
    State(state): State<Arc<WebhookAppState>>,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    state.presets.disable(&id)?;
    Ok(Json(ToggleResponse { success: true }))
}
