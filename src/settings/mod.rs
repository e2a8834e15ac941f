//! Settings-field mediation with secret redaction.
//!
//! Every field access goes through a lookup table of known fields, dispatched
//! directly by field id. Secret fields never reveal their content: reads
//! return the fixed mask whether or not a value is set, and writes are parsed
//! into an explicit [`WriteIntent`] so "unchanged" (the mask echoed back) and
//! "clear" (empty string) cannot be confused.

use crate::credentials::{CredentialStore, UserCredential};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Fixed placeholder echoed for any secret read.
pub const SECRET_MASK: &str = "****";

/// Parsed intent of a submitted field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteIntent {
    /// Mask echoed back: leave the stored value untouched
    Unchanged,
    /// Replace the stored value
    SetTo(String),
    /// Explicitly remove the stored value
    Clear,
}

impl WriteIntent {
    /// Interprets a submitted value for a secret field.
    pub fn for_secret(submitted: &str) -> Self {
        if submitted == SECRET_MASK {
            WriteIntent::Unchanged
        } else if submitted.is_empty() {
            WriteIntent::Clear
        } else {
            WriteIntent::SetTo(submitted.to_string())
        }
    }
}

/// Settings mediation errors.
#[derive(Debug)]
pub enum SettingsError {
    /// Field id not present in the registry
    UnknownField(String),
    /// Backing store failure; the write did not apply
    Persistence(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::UnknownField(id) => write!(f, "Unknown settings field '{}'", id),
            SettingsError::Persistence(msg) => write!(f, "Settings store failure: {}", msg),
        }
    }
}

impl std::error::Error for SettingsError {}

/// Where a field's value lives.
enum FieldBacking {
    /// Generic per-user key-value store
    Config,
    /// Secret delegated to the credential store (app password)
    CredentialSecret,
}

struct FieldSpec {
    id: &'static str,
    secret: bool,
    backing: FieldBacking,
}

/// Known settings fields. Dispatch is a table lookup by id; adding a field
/// means adding a row here.
const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        id: "sync.server_url",
        secret: false,
        backing: FieldBacking::Config,
    },
    FieldSpec {
        id: "sync.app_password",
        secret: true,
        backing: FieldBacking::CredentialSecret,
    },
    FieldSpec {
        id: "sync.enabled",
        secret: false,
        backing: FieldBacking::Config,
    },
    FieldSpec {
        id: "sync.interval_seconds",
        secret: false,
        backing: FieldBacking::Config,
    },
];

fn lookup_field(field_id: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.id == field_id)
}

/// Generic per-user key-value configuration store backed by SQLite.
///
/// Single-statement reads/writes; a failed write never partially applies.
pub struct ConfigStore {
    conn: Mutex<Connection>,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open settings database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                user_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (user_id, key)
            )
            "#,
            [],
        )
        .context("Failed to create settings table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, user_id: &str, key: &str) -> Result<Option<String>> {
        self.conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read setting")
    }

    pub fn set(&self, user_id: &str, key: &str, value: &str) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO settings (user_id, key, value)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value
                "#,
                params![user_id, key, value],
            )
            .context("Failed to write setting")?;

        Ok(())
    }

    pub fn remove(&self, user_id: &str, key: &str) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .context("Failed to remove setting")?;

        Ok(())
    }
}

/// Mediates reads and writes of settings fields, owning the redaction policy
/// but never the secret values themselves.
pub struct SettingsMediator {
    config: Arc<ConfigStore>,
    credentials: Arc<CredentialStore>,
    /// Fallback document-host URL for app passwords submitted before the user
    /// sets `sync.server_url`
    default_server_url: Option<String>,
}

impl SettingsMediator {
    pub fn new(
        config: Arc<ConfigStore>,
        credentials: Arc<CredentialStore>,
        default_server_url: Option<String>,
    ) -> Self {
        Self {
            config,
            credentials,
            default_server_url,
        }
    }

    /// Reads a field value.
    ///
    /// Secret fields always yield [`SECRET_MASK`], set or not, so presence
    /// cannot be inferred through this surface. Unset non-secret fields read
    /// as the empty string.
    pub fn read_field(&self, user_id: &str, field_id: &str) -> Result<String, SettingsError> {
        let field = lookup_field(field_id)
            .ok_or_else(|| SettingsError::UnknownField(field_id.to_string()))?;

        if field.secret {
            return Ok(SECRET_MASK.to_string());
        }

        match field.backing {
            FieldBacking::Config => self
                .config
                .get(user_id, field.id)
                .map(|v| v.unwrap_or_default())
                .map_err(|e| SettingsError::Persistence(format!("{:#}", e))),
            FieldBacking::CredentialSecret => Ok(SECRET_MASK.to_string()),
        }
    }

    /// Writes a field value.
    ///
    /// For secret fields the submitted value is parsed into a [`WriteIntent`]:
    /// the mask is a no-op, the empty string clears, anything else replaces.
    pub fn write_field(
        &self,
        user_id: &str,
        field_id: &str,
        submitted: &str,
    ) -> Result<(), SettingsError> {
        let field = lookup_field(field_id)
            .ok_or_else(|| SettingsError::UnknownField(field_id.to_string()))?;

        if !field.secret {
            debug!(user_id = %user_id, field = %field.id, "Writing settings field");
            return self
                .config
                .set(user_id, field.id, submitted)
                .map_err(|e| SettingsError::Persistence(format!("{:#}", e)));
        }

        match WriteIntent::for_secret(submitted) {
            WriteIntent::Unchanged => {
                debug!(user_id = %user_id, field = %field.id, "Mask echoed back, leaving secret untouched");
                Ok(())
            }
            WriteIntent::Clear => {
                info!(user_id = %user_id, field = %field.id, "Clearing secret field");
                self.clear_secret(user_id, field)
            }
            WriteIntent::SetTo(value) => {
                info!(user_id = %user_id, field = %field.id, "Storing new secret value");
                self.set_secret(user_id, field, value)
            }
        }
    }

    fn clear_secret(&self, user_id: &str, field: &FieldSpec) -> Result<(), SettingsError> {
        match field.backing {
            FieldBacking::CredentialSecret => self
                .credentials
                .delete(user_id)
                .map(|_| ())
                .map_err(|e| SettingsError::Persistence(format!("{:#}", e))),
            FieldBacking::Config => self
                .config
                .remove(user_id, field.id)
                .map_err(|e| SettingsError::Persistence(format!("{:#}", e))),
        }
    }

    fn set_secret(
        &self,
        user_id: &str,
        field: &FieldSpec,
        value: String,
    ) -> Result<(), SettingsError> {
        match field.backing {
            FieldBacking::CredentialSecret => {
                let server_url = self
                    .config
                    .get(user_id, "sync.server_url")
                    .map_err(|e| SettingsError::Persistence(format!("{:#}", e)))?
                    .filter(|v| !v.is_empty())
                    .or_else(|| self.default_server_url.clone())
                    .unwrap_or_default();

                let credential = UserCredential::connected(user_id, value, &server_url);
                self.credentials
                    .upsert(&credential)
                    .map_err(|e| SettingsError::Persistence(format!("{:#}", e)))
            }
            FieldBacking::Config => self
                .config
                .set(user_id, field.id, &value)
                .map_err(|e| SettingsError::Persistence(format!("{:#}", e))),
        }
    }
}
