//! Durable credential records backed by SQLite.
//!
//! Secrets are sealed via [`SecretCodec`] before hitting disk. All writes are
//! single statements, so concurrent readers never observe a partially written
//! row, and same-user writes serialize on the connection mutex.

use super::{CredentialStatus, SecretCodec, UserCredential};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Encrypted credential storage, one row per user.
///
/// # Schema
/// ```sql
/// CREATE TABLE user_credentials (
///     user_id TEXT PRIMARY KEY,
///     secret TEXT NOT NULL,             -- sealed (AES-256-GCM)
///     server_url TEXT NOT NULL,
///     status TEXT NOT NULL,             -- connected | invalid | revoked
///     created_at TEXT NOT NULL,         -- RFC 3339
///     last_validated_at TEXT            -- RFC 3339 (optional)
/// );
/// ```
///
/// # Thread safety
/// The connection is wrapped in a Mutex; SQLite's serialized mode plus
/// single-statement writes give upsert/delete whole-operation atomicity, so a
/// disconnect racing a callback lands strictly before or after the upsert.
pub struct CredentialStore {
    conn: Mutex<Connection>,
    codec: SecretCodec,
}

impl CredentialStore {
    /// Creates or opens a credential store at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P, codec: SecretCodec) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open credential database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS user_credentials (
                user_id TEXT PRIMARY KEY,
                secret TEXT NOT NULL,
                server_url TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_validated_at TEXT
            )
            "#,
            [],
        )
        .context("Failed to create user_credentials table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            codec,
        })
    }

    /// Atomic create-or-replace keyed by `user_id`.
    ///
    /// Overwriting an existing row preserves its `created_at` for diagnostics;
    /// every other column takes the new credential's value.
    pub fn upsert(&self, credential: &UserCredential) -> Result<()> {
        let sealed = self
            .codec
            .seal(&credential.secret)
            .context("Failed to seal credential secret")?;

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO user_credentials (
                    user_id, secret, server_url, status, created_at, last_validated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(user_id) DO UPDATE SET
                    secret = excluded.secret,
                    server_url = excluded.server_url,
                    status = excluded.status,
                    last_validated_at = excluded.last_validated_at
                "#,
                params![
                    credential.user_id,
                    sealed,
                    credential.server_url,
                    credential.status.as_str(),
                    credential.created_at.to_rfc3339(),
                    credential.last_validated_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .context("Failed to store credential")?;

        Ok(())
    }

    /// Retrieves and unseals the credential for `user_id`.
    pub fn get(&self, user_id: &str) -> Result<Option<UserCredential>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                r#"
                SELECT secret, server_url, status, created_at, last_validated_at
                FROM user_credentials
                WHERE user_id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query credential")?;

        let Some((sealed, server_url, status, created_at, last_validated_at)) = row else {
            return Ok(None);
        };

        let secret = self
            .codec
            .open(&sealed)
            .context("Failed to unseal credential secret")?;

        let status = CredentialStatus::parse(&status)
            .ok_or_else(|| anyhow!("Unknown credential status '{}'", status))?;

        Ok(Some(UserCredential {
            user_id: user_id.to_string(),
            secret,
            server_url,
            created_at: parse_timestamp(&created_at)?,
            last_validated_at: last_validated_at
                .map(|s| parse_timestamp(&s))
                .transpose()?,
            status,
        }))
    }

    /// Deletes the credential for `user_id`. Idempotent.
    ///
    /// Returns whether a row was actually removed.
    pub fn delete(&self, user_id: &str) -> Result<bool> {
        let rows = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM user_credentials WHERE user_id = ?1",
                params![user_id],
            )
            .context("Failed to delete credential")?;

        Ok(rows > 0)
    }

    /// Marks the credential invalid without deleting it.
    ///
    /// Used when the host rejects the stored secret during validation;
    /// `created_at` survives so diagnostics can see when it was issued.
    pub fn mark_invalid(&self, user_id: &str) -> Result<()> {
        self.set_status(user_id, CredentialStatus::Invalid, None)
    }

    /// Marks the credential connected and records a successful validation.
    pub fn mark_validated(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.set_status(user_id, CredentialStatus::Connected, Some(at))
    }

    fn set_status(
        &self,
        user_id: &str,
        status: CredentialStatus,
        validated_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        match validated_at {
            Some(at) => conn.execute(
                "UPDATE user_credentials SET status = ?2, last_validated_at = ?3 WHERE user_id = ?1",
                params![user_id, status.as_str(), at.to_rfc3339()],
            ),
            None => conn.execute(
                "UPDATE user_credentials SET status = ?2 WHERE user_id = ?1",
                params![user_id, status.as_str()],
            ),
        }
        .context("Failed to update credential status")?;

        Ok(())
    }

    /// Lists all users with a stored credential, ordered by user id.
    ///
    /// Used by the sync worker on startup to resume per-user synchronization.
    pub fn list_users(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT user_id FROM user_credentials ORDER BY user_id")
            .context("Failed to prepare query")?;

        let users = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to execute query")?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to read results")?;

        Ok(users)
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .context("Failed to parse stored timestamp")
}
