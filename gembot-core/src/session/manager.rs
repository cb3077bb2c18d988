//! In-process session store

use super::store::{Session, Turn};
use crate::config::SessionsConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Shared handle to one session. Holding its lock serialises exchanges on
/// that session.
pub type SessionHandle<C> = Arc<AsyncMutex<Session<C>>>;

/// Eviction limits; both off by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions idle longer than this are purged
    pub ttl: Option<Duration>,
    /// Upper bound on live sessions
    pub max_sessions: Option<usize>,
}

impl From<&SessionsConfig> for SessionLimits {
    fn from(config: &SessionsConfig) -> Self {
        Self {
            ttl: config.ttl_secs.map(Duration::from_secs),
            max_sessions: config.max_sessions,
        }
    }
}

struct Entry<C> {
    session: SessionHandle<C>,
    last_active: Instant,
}

/// Maps session ids to their conversation state.
///
/// The map lock is only held for lookups and inserts, never across an await,
/// so lookup-or-create is atomic per id while different sessions proceed
/// independently.
pub struct SessionStore<C> {
    sessions: Mutex<HashMap<String, Entry<C>>>,
    limits: SessionLimits,
}

impl<C> SessionStore<C> {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::with_limits(SessionLimits::default())
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limits,
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Get the session for `id`, creating it with `create` if unseen.
    ///
    /// `create` runs under the map lock and must not block.
    pub fn get_or_create(&self, id: &str, create: impl FnOnce() -> C) -> SessionHandle<C> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();

        if let Some(entry) = sessions.get_mut(id) {
            entry.last_active = now;
            return entry.session.clone();
        }

        if let Some(max) = self.limits.max_sessions {
            while sessions.len() >= max {
                let Some(oldest) = sessions
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_active)
                    .map(|(key, _)| key.clone())
                else {
                    break;
                };
                sessions.remove(&oldest);
                debug!("Evicted least recently active session {}", oldest);
            }
        }

        let session = Arc::new(AsyncMutex::new(Session::new(id, create())));
        sessions.insert(
            id.to_string(),
            Entry {
                session: session.clone(),
                last_active: now,
            },
        );
        debug!("Created session {}", id);
        session
    }

    /// Get a session if it exists
    pub fn get(&self, id: &str) -> Option<SessionHandle<C>> {
        self.sessions.lock().get(id).map(|entry| entry.session.clone())
    }

    /// Append a user/assistant turn pair. Returns false if the session is gone.
    pub async fn record_exchange(&self, id: &str, user: &str, assistant: &str) -> bool {
        let Some(session) = self.get(id) else {
            warn!("Dropping exchange for unknown session {}", id);
            return false;
        };
        session.lock().await.record_exchange(user, assistant);
        true
    }

    /// Remove a session. Returns whether one was present.
    pub fn clear(&self, id: &str) -> bool {
        let removed = self.sessions.lock().remove(id).is_some();
        if removed {
            debug!("Cleared session {}", id);
        }
        removed
    }

    /// Turns for `id` in chronological order; empty for unknown sessions
    pub async fn get_history(&self, id: &str) -> Vec<Turn> {
        match self.get(id) {
            Some(session) => session.lock().await.history().to_vec(),
            None => Vec::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Ids of all live sessions, unordered
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Drop sessions idle past the TTL. No-op without a TTL.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Same as [`purge_expired`](Self::purge_expired) against an explicit clock
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let Some(ttl) = self.limits.ttl else {
            return 0;
        };

        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_active) <= ttl);
        let purged = before - sessions.len();
        if purged > 0 {
            info!("Purged {} idle sessions", purged);
        }
        purged
    }
}

impl<C> Default for SessionStore<C> {
    fn default() -> Self {
        Self::new()
    }
}
