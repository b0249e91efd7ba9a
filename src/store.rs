//! Session persistence port
//!
//! The engine saves the whole session aggregate as one unit inside the
//! mutation's critical section. A store failure aborts the operation before
//! any in-memory state becomes observable, so callers never see a half-applied
//! mutation. The port deliberately says nothing about the backing technology.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::ids::SessionKey;
use crate::session::QueueSession;

/// Durable storage for session aggregates
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, `None` if it was never saved
    async fn load(&self, key: &SessionKey) -> Result<Option<QueueSession>>;

    /// Persist a session; an error must mean nothing was written
    async fn save(&self, session: &QueueSession) -> Result<()>;
}

/// Process-local store, the default and the test double
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<SessionKey, QueueSession>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<QueueSession>> {
        Ok(self.sessions.read().get(key).cloned())
    }

    async fn save(&self, session: &QueueSession) -> Result<()> {
        self.sessions
            .write()
            .insert(session.key.clone(), session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EstimatorConfig, SessionDefaults};
    use chrono::Utc;

    #[tokio::test]
    async fn save_then_load_round_trips_a_session() {
        let store = InMemoryStore::new();
        let key = SessionKey::new("loc-1", Utc::now().date_naive());
        let session = QueueSession::new(
            key.clone(),
            &SessionDefaults::default(),
            &EstimatorConfig::default(),
            Utc::now(),
        );

        assert!(store.load(&key).await.unwrap().is_none());
        store.save(&session).await.unwrap();
        let loaded = store.load(&key).await.unwrap().unwrap();
        assert_eq!(loaded.key, key);
        assert_eq!(store.len(), 1);
    }
}
