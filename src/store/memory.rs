//! In-process `SessionStore`, ported from `mcp_db.storage.base.InMemoryStorage`.
//! Used for tests and as a degraded-mode fallback; its lock set never
//! expires, which is documented here (and in `spec.md` §9's open questions)
//! as a test-only limitation.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::SessionStore;
use crate::error::StoreResult;
use crate::model::SessionRecord;

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, SessionRecord>,
    locks: HashSet<String>,
}

pub struct MemorySessionStore {
    inner: Mutex<Inner>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, record: SessionRecord) -> StoreResult<()> {
        self.inner.lock().await.sessions.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self.inner.lock().await.sessions.get(id).cloned())
    }

    async fn update_session(&self, id: &str, patch: &Map<String, Value>) -> StoreResult<()> {
        let mut guard = self.inner.lock().await;
        if let Some(record) = guard.sessions.get_mut(id) {
            record.apply_patch(patch);
        }
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> StoreResult<()> {
        self.inner.lock().await.sessions.remove(id);
        Ok(())
    }

    async fn acquire_lock(&self, key: &str, _ttl: Duration) -> StoreResult<bool> {
        Ok(self.inner.lock().await.locks.insert(key.to_string()))
    }

    async fn release_lock(&self, key: &str) -> StoreResult<()> {
        self.inner.lock().await.locks.remove(key);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
