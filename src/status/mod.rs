//! Connection/sync status aggregation.
//!
//! Status reads stay available even when the document host is unreachable: a
//! probe failure degrades to the last known status flagged `stale` instead of
//! failing the call.

use crate::credentials::{CredentialStatus, CredentialStore, UserCredential};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a status query for one user.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SyncStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validated_at: Option<DateTime<Utc>>,
    /// True when the host could not be reached and the answer is cached
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncStatus {
    fn disconnected() -> Self {
        Self {
            connected: false,
            last_validated_at: None,
            stale: false,
            error: None,
        }
    }
}

/// Computes per-user sync status from the credential store plus a lightweight
/// liveness probe against the document host.
pub struct StatusAggregator {
    store: Arc<CredentialStore>,
    freshness_window: Duration,
    probe_timeout: std::time::Duration,
    probe_path: String,
}

impl StatusAggregator {
    pub fn new(
        store: Arc<CredentialStore>,
        freshness_window_seconds: i64,
        probe_timeout: std::time::Duration,
        probe_path: String,
    ) -> Self {
        Self {
            store,
            freshness_window: Duration::seconds(freshness_window_seconds),
            probe_timeout,
            probe_path,
        }
    }

    /// Returns the sync status for `user_id`.
    ///
    /// A validation younger than the freshness window is answered from the
    /// store without touching the host. Otherwise the host is probed with a
    /// bounded timeout: success refreshes the validation timestamp, an
    /// explicit 401/403 marks the credential invalid, and a network failure
    /// falls back to the cached status with `stale: true`.
    pub async fn get_status(&self, user_id: &str) -> Result<SyncStatus> {
        let Some(credential) = self.store.get(user_id)? else {
            return Ok(SyncStatus::disconnected());
        };

        match credential.status {
            CredentialStatus::Revoked => Ok(SyncStatus {
                connected: false,
                last_validated_at: credential.last_validated_at,
                stale: false,
                error: None,
            }),
            CredentialStatus::Invalid => Ok(SyncStatus {
                connected: false,
                last_validated_at: credential.last_validated_at,
                stale: false,
                error: Some("credential rejected by host, re-authorization required".to_string()),
            }),
            CredentialStatus::Connected => {
                if self.is_fresh(&credential) {
                    return Ok(SyncStatus {
                        connected: true,
                        last_validated_at: credential.last_validated_at,
                        stale: false,
                        error: None,
                    });
                }
                self.probe(&credential).await
            }
        }
    }

    fn is_fresh(&self, credential: &UserCredential) -> bool {
        credential
            .last_validated_at
            .map(|at| Utc::now() - at <= self.freshness_window)
            .unwrap_or(false)
    }

    async fn probe(&self, credential: &UserCredential) -> Result<SyncStatus> {
        let url = format!(
            "{}{}",
            credential.server_url.trim_end_matches('/'),
            self.probe_path
        );

        debug!(user_id = %credential.user_id, url = %url, "Probing document host");

        let client = reqwest::Client::new();
        let response = client
            .get(&url)
            .bearer_auth(&credential.secret)
            .timeout(self.probe_timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let now = Utc::now();
                self.store.mark_validated(&credential.user_id, now)?;
                Ok(SyncStatus {
                    connected: true,
                    last_validated_at: Some(now),
                    stale: false,
                    error: None,
                })
            }
            Ok(resp)
                if resp.status() == reqwest::StatusCode::UNAUTHORIZED
                    || resp.status() == reqwest::StatusCode::FORBIDDEN =>
            {
                // Explicit rejection of the stored secret, not a network blip
                warn!(user_id = %credential.user_id, status = %resp.status(), "Host rejected stored credential");
                self.store.mark_invalid(&credential.user_id)?;
                Ok(SyncStatus {
                    connected: false,
                    last_validated_at: credential.last_validated_at,
                    stale: false,
                    error: Some("credential rejected by host, re-authorization required".to_string()),
                })
            }
            Ok(resp) => {
                // Host reachable but unhealthy; keep the cached answer
                debug!(user_id = %credential.user_id, status = %resp.status(), "Host probe returned non-success");
                Ok(self.cached(credential))
            }
            Err(e) => {
                debug!(user_id = %credential.user_id, error = %e, "Host unreachable, serving cached status");
                Ok(self.cached(credential))
            }
        }
    }

    fn cached(&self, credential: &UserCredential) -> SyncStatus {
        SyncStatus {
            connected: credential.status == CredentialStatus::Connected,
            last_validated_at: credential.last_validated_at,
            stale: true,
            error: None,
        }
    }
}
