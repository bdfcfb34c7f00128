use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use domains::{Result, Session, SessionStore};
use tracing::debug;

/// Process-local login state with a fixed time-to-live.
///
/// Expired sessions are dropped lazily when next checked.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn begin(&self, username: &str) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            username: username.to_string(),
            started_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.insert(username.to_string(), session.clone());
        Ok(session)
    }

    async fn end(&self, username: &str) -> Result<bool> {
        Ok(self.sessions.remove(username).is_some())
    }

    async fn is_active(&self, username: &str) -> Result<bool> {
        let now = Utc::now();
        let expired = self
            .sessions
            .remove_if(username, |_, session| !session.is_live(now))
            .is_some();
        if expired {
            debug!(username, "session expired");
            return Ok(false);
        }
        Ok(self.sessions.contains_key(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_end_cycle() {
        tokio_test::block_on(async {
            let store = MemorySessionStore::default();
            assert!(!store.is_active("alice").await.unwrap());
            store.begin("alice").await.unwrap();
            assert!(store.is_active("alice").await.unwrap());
            assert!(store.end("alice").await.unwrap());
            assert!(!store.end("alice").await.unwrap());
            assert!(!store.is_active("alice").await.unwrap());
        });
    }

    #[tokio::test]
    async fn expired_sessions_are_inactive() {
        let store = MemorySessionStore::new(Duration::seconds(-1));
        store.begin("alice").await.unwrap();
        assert!(!store.is_active("alice").await.unwrap());
        assert!(!store.end("alice").await.unwrap());
    }
}
