//! Single-use OAuth session tokens for CSRF protection.
//!
//! Each authorization attempt gets an unguessable `state` value binding the
//! request to its callback. A state is consumed exactly once; replays and
//! expired sessions are rejected.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Pending authorization attempt, keyed by its state token.
#[derive(Clone, Debug)]
pub struct OAuthSession {
    pub user_id: String,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory session store with TTL expiry.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, OAuthSession>>>,
    ttl: Duration,
}

impl SessionStore {
    /// # Arguments
    /// * `ttl_seconds` - How long sessions remain valid (default: 600 = 10 minutes)
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Opens a session for `user_id` and returns its state token (UUID v4).
    pub fn begin(&self, user_id: &str, redirect_uri: &str) -> String {
        let state = Uuid::new_v4().to_string();
        let session = OAuthSession {
            user_id: user_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            created_at: Utc::now(),
        };

        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(state.clone(), session);

        state
    }

    /// Validates and consumes a state token.
    ///
    /// The session is removed under the map lock, so two concurrent callbacks
    /// with the same state see exactly one `Some`. Expired sessions return
    /// `None` (and are dropped by the removal).
    pub fn consume(&self, state: &str) -> Option<OAuthSession> {
        let mut sessions = self.sessions.lock().unwrap();

        let session = sessions.remove(state)?;

        if Utc::now() - session.created_at > self.ttl {
            return None;
        }

        Some(session)
    }

    /// Drops expired sessions. Called periodically.
    pub fn sweep_expired(&self) {
        let mut sessions = self.sessions.lock().unwrap();
        let now = Utc::now();

        sessions.retain(|_, session| now - session.created_at <= self.ttl);
    }

    /// Number of pending sessions (for monitoring).
    pub fn count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

/// Background task that periodically sweeps expired sessions.
pub async fn run_session_sweeper(store: SessionStore, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        store.sweep_expired();
        tracing::debug!("OAuth session sweep complete, {} sessions pending", store.count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_consume() {
        let store = SessionStore::new(600);

        let state = store.begin("u1", "https://app.example.com/settings");
        assert!(!state.is_empty());

        let session = store.consume(&state).expect("session should be valid");
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.redirect_uri, "https://app.example.com/settings");
    }

    #[test]
    fn test_state_is_single_use() {
        let store = SessionStore::new(600);

        let state = store.begin("alice", "https://app.example.com/cb");

        assert!(store.consume(&state).is_some());

        // Replay fails
        assert!(store.consume(&state).is_none());
    }

    #[test]
    fn test_unknown_state_rejected() {
        let store = SessionStore::new(600);
        assert!(store.consume("not-a-real-state").is_none());
    }

    #[test]
    fn test_expired_state_rejected() {
        let store = SessionStore::new(0);

        let state = store.begin("bob", "https://app.example.com/cb");

        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert!(store.consume(&state).is_none());
    }

    #[test]
    fn test_sweep_removes_expired() {
        let store = SessionStore::new(0);

        store.begin("u1", "https://a.example.com");
        store.begin("u2", "https://b.example.com");
        assert_eq!(store.count(), 2);

        std::thread::sleep(std::time::Duration::from_millis(1100));

        store.sweep_expired();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_states_are_unique() {
        let store = SessionStore::new(600);
        let a = store.begin("u1", "https://a.example.com");
        let b = store.begin("u1", "https://a.example.com");
        assert_ne!(a, b);
    }
}
