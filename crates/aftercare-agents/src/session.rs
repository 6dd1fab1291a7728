//! Process-wide session store.
//!
//! Sessions are keyed by the caller's opaque id. The outer map lock is held
//! only for lookup/insert; each session carries its own async mutex so that
//! turns within one session are strictly serialized across await points
//! while distinct sessions proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tracing::debug;

use aftercare_core::types::Session;

/// Shared handle to one session, serialized by its own async mutex.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Session store with idle-timeout eviction and idempotent clear.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    idle_timeout_minutes: u32,
}

impl SessionStore {
    pub fn new(idle_timeout_minutes: u32) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout_minutes,
        }
    }

    /// Get the handle for a session, creating a fresh one if the id is
    /// unknown or the existing session has idled out. An evicted or cleared
    /// id behaves exactly like a never-seen id.
    pub fn checkout(&self, id: &str) -> SessionHandle {
        let mut sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Session map lock poisoned: {}", e);
                // Hand back a detached session; the turn still completes.
                return Arc::new(tokio::sync::Mutex::new(Session::new(id)));
            }
        };

        if let Some(handle) = sessions.get(id) {
            let expired = handle
                .try_lock()
                .map(|s| self.is_expired(&s))
                .unwrap_or(false);
            if !expired {
                return Arc::clone(handle);
            }
            debug!(session = id, "Evicting idle session");
            sessions.remove(id);
        }

        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(Session::new(id)));
        sessions.insert(id.to_string(), Arc::clone(&handle));
        handle
    }

    /// Snapshot a session without creating it.
    pub fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.lock().ok()?;
        let handle = sessions.get(id)?;
        handle.try_lock().ok().map(|s| s.clone())
    }

    /// Remove a session. Idempotent: clearing an unknown id is a no-op.
    /// Returns whether a session actually existed.
    pub fn clear(&self, id: &str) -> bool {
        match self.sessions.lock() {
            Ok(mut sessions) => sessions.remove(id).is_some(),
            Err(_) => false,
        }
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn is_expired(&self, session: &Session) -> bool {
        let timeout = Duration::minutes(i64::from(self.idle_timeout_minutes));
        Utc::now() - session.last_activity_at > timeout
    }
}
