//! Named webhook presets.
//!
//! A preset is a predefined webhook configuration (name plus the host events
//! it forwards) that admins toggle on or off without supplying raw webhook
//! parameters. Definitions are static; only the enabled flag is persisted.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// A toggleable webhook preset.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct WebhookPreset {
    pub preset_id: String,
    pub name: String,
    pub enabled: bool,
    pub target_events: Vec<String>,
}

/// Preset toggle errors.
#[derive(Debug, PartialEq)]
pub enum PresetError {
    /// Preset id not in the definition table (client error)
    UnknownPreset(String),
    /// Toggle could not be persisted
    Persistence(String),
}

impl std::fmt::Display for PresetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresetError::UnknownPreset(id) => write!(f, "Unknown webhook preset '{}'", id),
            PresetError::Persistence(msg) => write!(f, "Preset store failure: {}", msg),
        }
    }
}

impl std::error::Error for PresetError {}

struct PresetDef {
    id: &'static str,
    name: &'static str,
    target_events: &'static [&'static str],
}

/// Built-in preset definitions, kept sorted by id for stable listing.
const PRESETS: &[PresetDef] = &[
    PresetDef {
        id: "document-activity",
        name: "Document activity",
        target_events: &["document.created", "document.updated", "document.deleted"],
    },
    PresetDef {
        id: "share-events",
        name: "Sharing events",
        target_events: &["share.created", "share.removed"],
    },
    PresetDef {
        id: "sync-failures",
        name: "Background sync failures",
        target_events: &["sync.failed", "sync.credential_invalid"],
    },
];

fn lookup_preset(preset_id: &str) -> Option<&'static PresetDef> {
    PRESETS.iter().find(|p| p.id == preset_id)
}

/// Toggle store for webhook presets, enabled flags persisted in SQLite.
pub struct WebhookPresetManager {
    conn: Mutex<Connection>,
}

impl WebhookPresetManager {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open webhook preset database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS webhook_presets (
                preset_id TEXT PRIMARY KEY,
                enabled INTEGER NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create webhook_presets table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lists all presets in stable preset-id order.
    pub fn list(&self) -> Result<Vec<WebhookPreset>> {
        let conn = self.conn.lock().unwrap();

        PRESETS
            .iter()
            .map(|def| {
                let enabled: Option<bool> = conn
                    .query_row(
                        "SELECT enabled FROM webhook_presets WHERE preset_id = ?1",
                        params![def.id],
                        |row| row.get(0),
                    )
                    .optional()
                    .context("Failed to read preset flag")?;

                Ok(WebhookPreset {
                    preset_id: def.id.to_string(),
                    name: def.name.to_string(),
                    enabled: enabled.unwrap_or(false),
                    target_events: def.target_events.iter().map(|e| e.to_string()).collect(),
                })
            })
            .collect()
    }

    /// Enables a preset. Re-enabling an enabled preset is a no-op success.
    pub fn enable(&self, preset_id: &str) -> Result<(), PresetError> {
        self.set_enabled(preset_id, true)
    }

    /// Disables a preset. Idempotent like [`enable`](Self::enable).
    pub fn disable(&self, preset_id: &str) -> Result<(), PresetError> {
        self.set_enabled(preset_id, false)
    }

    fn set_enabled(&self, preset_id: &str, enabled: bool) -> Result<(), PresetError> {
        let def = lookup_preset(preset_id)
            .ok_or_else(|| PresetError::UnknownPreset(preset_id.to_string()))?;

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO webhook_presets (preset_id, enabled)
                VALUES (?1, ?2)
                ON CONFLICT(preset_id) DO UPDATE SET enabled = excluded.enabled
                "#,
                params![def.id, enabled],
            )
            .map_err(|e| PresetError::Persistence(e.to_string()))?;

        info!(preset = %def.id, enabled, "Webhook preset toggled");
        Ok(())
    }
}
