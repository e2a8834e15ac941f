use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use syncbridge::api::{
    create_oauth_router, create_settings_router, create_sync_router, create_webhook_router,
    OAuthAppState, SettingsAppState, SyncAppState, WebhookAppState,
};
use syncbridge::config::{load_config, SyncBridgeConfig};
use syncbridge::credentials::{CredentialStore, SecretCodec};
use syncbridge::oauth::{run_session_sweeper, OAuthFlow, SessionStore};
use syncbridge::settings::{ConfigStore, SettingsMediator};
use syncbridge::status::StatusAggregator;
use syncbridge::webhooks::WebhookPresetManager;
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncbridge=info".into()),
        )
        .init();

    let mut config = match std::env::var("SYNCBRIDGE_CONFIG") {
        Ok(path) => load_config(&path).with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => SyncBridgeConfig::default(),
    };
    config.apply_env_overrides();

    let encryption_key = config
        .storage
        .encryption_key
        .as_deref()
        .context("No encryption key configured (set storage.encryption_key or SYNCBRIDGE_ENCRYPTION_KEY)")?;
    let codec = SecretCodec::from_base64_key(encryption_key)?;

    let credential_store = Arc::new(CredentialStore::new(&config.storage.db_path, codec)?);
    let config_store = Arc::new(ConfigStore::new(&config.storage.db_path)?);
    let preset_manager = Arc::new(WebhookPresetManager::new(&config.storage.db_path)?);

    let sessions = SessionStore::new(config.flow.session_ttl_seconds);
    let flow = Arc::new(OAuthFlow::new(
        config.host.clone(),
        sessions.clone(),
        credential_store.clone(),
        Duration::from_secs(config.flow.http_timeout_seconds),
    ));

    let aggregator = Arc::new(StatusAggregator::new(
        credential_store.clone(),
        config.status.freshness_window_seconds,
        Duration::from_secs(config.status.probe_timeout_seconds),
        config.status.probe_path.clone(),
    ));

    let mediator = Arc::new(SettingsMediator::new(
        config_store,
        credential_store.clone(),
        config.host.server_url.clone(),
    ));

    // Sweep expired authorization sessions once a minute
    tokio::spawn(run_session_sweeper(sessions, 60));

    let app = create_oauth_router(OAuthAppState {
        flow,
        auth_enabled: config.api.auth_enabled,
        callback_base_url: config.flow.callback_base_url.clone(),
        settings_return_url: config.flow.settings_return_url.clone(),
    })
    .merge(create_sync_router(SyncAppState {
        store: credential_store,
        aggregator,
        auth_enabled: config.api.auth_enabled,
    }))
    .merge(create_settings_router(SettingsAppState {
        mediator,
        auth_enabled: config.api.auth_enabled,
    }))
    .merge(create_webhook_router(WebhookAppState {
        presets: preset_manager,
    }))
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.api.bind_addr))?;

    info!(addr = %config.api.bind_addr, "syncbridge listening");

    axum::serve(listener, app).await?;

    Ok(())
}
