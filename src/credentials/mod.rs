//! Encrypted per-user credential storage for the background sync worker.
//!
//! A credential is the app password (or OAuth access token) the worker uses
//! to act on a user's behalf against the external document host. Secret
//! material is sealed with AES-256-GCM before it touches SQLite and is never
//! written to logs or returned by metadata APIs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore                    │
//! │  - upsert / get / delete                 │
//! │  - status transitions                    │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!      (seal)               (open)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       SecretCodec (AES-256-GCM)          │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       SQLite (sealed secrets at rest)    │
//! └─────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod codec;
mod store;

pub use codec::SecretCodec;
pub use store::CredentialStore;

/// Validity state of a stored credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    /// Credential accepted by the host on last validation
    Connected,
    /// Host rejected the credential; re-authorization required
    Invalid,
    /// Credential was revoked locally
    Revoked,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Connected => "connected",
            CredentialStatus::Invalid => "invalid",
            CredentialStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "connected" => Some(CredentialStatus::Connected),
            "invalid" => Some(CredentialStatus::Invalid),
            "revoked" => Some(CredentialStatus::Revoked),
            _ => None,
        }
    }
}

/// A user's credential for the external document host.
///
/// At most one credential exists per user; storing a new one replaces the
/// old. The `secret` field holds plaintext only in memory.
#[derive(Clone, Debug)]
pub struct UserCredential {
    /// Owning user (unique key)
    pub user_id: String,

    /// App password or access token (sealed before storage)
    pub secret: String,

    /// Base URL of the document host this credential is valid for
    pub server_url: String,

    /// When the credential was first stored (preserved across overwrites)
    pub created_at: DateTime<Utc>,

    /// When the host last accepted this credential, if ever checked
    pub last_validated_at: Option<DateTime<Utc>>,

    /// Current validity state
    pub status: CredentialStatus,
}

impl UserCredential {
    /// Builds a freshly-issued credential in the `Connected` state.
    pub fn connected(user_id: &str, secret: String, server_url: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            secret,
            server_url: server_url.to_string(),
            created_at: now,
            last_validated_at: Some(now),
            status: CredentialStatus::Connected,
        }
    }
}
