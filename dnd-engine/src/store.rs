//! Live sessions, keyed by id.
//!
//! Each session sits behind its own `tokio::sync::Mutex`, so one player's
//! turn never waits on another's. Sessions that go untouched for longer
//! than the TTL are treated as gone and dropped by [`SessionStore::expire_idle`].

use crate::config::EngineConfig;
use crate::session::GameSession;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared handle to one session. Lock it for the length of a turn.
pub type SessionHandle = Arc<Mutex<GameSession>>;

struct StoreEntry {
    handle: SessionHandle,
    last_touched: Instant,
}

/// Holds every live session.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, StoreEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// A store whose TTL is `config.session_ttl_secs`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.session_ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a session and return its id.
    pub async fn create(&self, session: GameSession) -> SessionId {
        let id = SessionId::new();
        let entry = StoreEntry {
            handle: Arc::new(Mutex::new(session)),
            last_touched: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        tracing::info!(session = %id, "Session created");
        id
    }

    /// Fetch a session and mark it as used. Idle-expired sessions are not
    /// returned even before they are swept.
    pub async fn get(&self, id: SessionId) -> Option<SessionHandle> {
        let mut guard = self.sessions.write().await;
        let entry = guard.get_mut(&id)?;
        if entry.last_touched.elapsed() >= self.ttl {
            return None;
        }
        entry.last_touched = Instant::now();
        Some(Arc::clone(&entry.handle))
    }

    /// Remove a session. Returns false if it did not exist.
    pub async fn destroy(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session = %id, "Session destroyed");
        }
        removed
    }

    /// Drop every session idle for at least the TTL. Returns how many went.
    pub async fn expire_idle(&self) -> usize {
        let mut guard = self.sessions.write().await;
        let before = guard.len();
        guard.retain(|_, entry| entry.last_touched.elapsed() < self.ttl);
        let expired = before - guard.len();
        if expired > 0 {
            tracing::info!(expired, remaining = guard.len(), "Expired idle sessions");
        }
        expired
    }

    /// Number of stored sessions, including idle ones not yet swept.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Pretend a session was last used `ago` in the past.
    #[cfg(test)]
    async fn backdate(&self, id: SessionId, ago: Duration) {
        if let Some(entry) = self.sessions.write().await.get_mut(&id) {
            entry.last_touched = Instant::now() - ago;
        }
    }
}
