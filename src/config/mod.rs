//! Service configuration, loaded from TOML.
//!
//! Configuration is an explicit object handed to the components that need it
//! at construction time; nothing reads config through an ambient global.
//! Secrets (client secret, encryption key) can be supplied via environment
//! variables instead of the file.

use serde::Deserialize;

/// Complete syncbridge configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SyncBridgeConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// External document host: API base URL, OAuth endpoints, client identity.
///
/// Endpoints are optional; operations that need a missing endpoint fail with
/// a configuration error rather than guessing.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HostConfig {
    /// Base URL of the document host API (stored into issued credentials)
    pub server_url: Option<String>,
    /// OAuth authorization endpoint
    pub authorize_url: Option<String>,
    /// OAuth token endpoint
    pub token_url: Option<String>,
    /// Optional token-revocation endpoint
    pub revoke_url: Option<String>,
    /// OAuth client id for this application
    pub client_id: Option<String>,
    /// OAuth client secret (or SYNCBRIDGE_CLIENT_SECRET)
    pub client_secret: Option<String>,
    /// Scopes requested on authorization
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Credential and settings storage.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Base64-encoded 32-byte master key (or SYNCBRIDGE_ENCRYPTION_KEY)
    pub encryption_key: Option<String>,
}

fn default_db_path() -> String {
    "syncbridge.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            encryption_key: None,
        }
    }
}

/// OAuth flow tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// How long a pending authorization stays valid (seconds)
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: i64,
    /// Upper bound for token-exchange and revoke requests (seconds)
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
    /// Public base URL of this service, used to build the callback URL
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
    /// Where the browser lands after the callback (settings/status page)
    #[serde(default = "default_settings_return_url")]
    pub settings_return_url: String,
}

fn default_session_ttl() -> i64 {
    600
}

fn default_http_timeout() -> u64 {
    10
}

fn default_callback_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_settings_return_url() -> String {
    "/settings/background-sync".to_string()
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: default_session_ttl(),
            http_timeout_seconds: default_http_timeout(),
            callback_base_url: default_callback_base_url(),
            settings_return_url: default_settings_return_url(),
        }
    }
}

/// Status aggregation tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    /// A validation younger than this window is served from cache (seconds)
    #[serde(default = "default_freshness_window")]
    pub freshness_window_seconds: i64,
    /// Upper bound on the liveness probe (seconds)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
    /// Path probed on the document host, relative to the credential's server URL
    #[serde(default = "default_probe_path")]
    pub probe_path: String,
}

fn default_freshness_window() -> i64 {
    300
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_probe_path() -> String {
    "/api/v1/ping".to_string()
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            freshness_window_seconds: default_freshness_window(),
            probe_timeout_seconds: default_probe_timeout(),
            probe_path: default_probe_path(),
        }
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// When false, requests without a bearer token act as the "default" user
    #[serde(default = "default_auth_enabled")]
    pub auth_enabled: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_auth_enabled() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth_enabled: default_auth_enabled(),
        }
    }
}

impl SyncBridgeConfig {
    /// Applies environment-variable overrides for secret values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("SYNCBRIDGE_CLIENT_SECRET") {
            self.host.client_secret = Some(secret);
        }
        if let Ok(key) = std::env::var("SYNCBRIDGE_ENCRYPTION_KEY") {
            self.storage.encryption_key = Some(key);
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &str) -> anyhow::Result<SyncBridgeConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config: SyncBridgeConfig = toml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncBridgeConfig::default();
        assert_eq!(config.flow.session_ttl_seconds, 600);
        assert_eq!(config.status.freshness_window_seconds, 300);
        assert_eq!(config.storage.db_path, "syncbridge.db");
        assert_eq!(config.api.bind_addr, "0.0.0.0:3000");
        assert!(config.host.authorize_url.is_none());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [host]
            server_url = "https://docs.example.com"
            authorize_url = "https://docs.example.com/oauth/authorize"
            token_url = "https://docs.example.com/oauth/token"
            client_id = "sync-client"
            scopes = ["documents.read"]

            [storage]
            db_path = "/var/lib/syncbridge/data.db"

            [flow]
            session_ttl_seconds = 300
            callback_base_url = "https://bridge.example.com"

            [status]
            freshness_window_seconds = 120

            [api]
            bind_addr = "127.0.0.1:8080"
            auth_enabled = false
        "#;

        let config: SyncBridgeConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.host.server_url.as_deref(),
            Some("https://docs.example.com")
        );
        assert_eq!(config.host.scopes, vec!["documents.read".to_string()]);
        assert_eq!(config.storage.db_path, "/var/lib/syncbridge/data.db");
        assert_eq!(config.flow.session_ttl_seconds, 300);
        assert_eq!(config.status.freshness_window_seconds, 120);
        assert!(!config.api.auth_enabled);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
            [status]
            probe_timeout_seconds = 2
        "#;

        let config: SyncBridgeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.status.probe_timeout_seconds, 2);
        assert_eq!(config.status.probe_path, "/api/v1/ping");
        assert_eq!(config.flow.session_ttl_seconds, 600);
    }
}
