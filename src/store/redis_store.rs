//! Redis-backed `SessionStore`, ported from
//! `mcp_db.storage.redis_adapter.RedisStorage`. Sessions are JSON strings at
//! `{prefix}:session:{id}`; locks use `SET key val NX PX ttl_ms` / `DEL key`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::{Map, Value};

use super::SessionStore;
use crate::error::{StoreError, StoreResult};
use crate::model::SessionRecord;

pub struct RedisSessionStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisSessionStore {
    /// Connect to `connection_string` and return a store using `key_prefix`
    /// for all session and lock keys.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transient` if the client cannot be constructed
    /// or the initial connection fails.
    pub async fn connect(connection_string: &str, key_prefix: impl Into<String>) -> StoreResult<Self> {
        let client = redis::Client::open(connection_string).map_err(|e| StoreError::transient(e.to_string()))?;
        let conn =
            ConnectionManager::new(client).await.map_err(|e| StoreError::transient(e.to_string()))?;
        Ok(Self { conn, key_prefix: key_prefix.into() })
    }

    fn session_key(&self, id: &str) -> String {
        format!("{}:session:{}", self.key_prefix, id)
    }

    fn lock_key(&self, key: &str) -> String {
        format!("{}:lock:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create_session(&self, record: SessionRecord) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&record)?;
        let _: () = conn
            .set(self.session_key(&record.id), payload)
            .await
            .map_err(|e| StoreError::transient(e.to_string()))?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<SessionRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> =
            conn.get(self.session_key(id)).await.map_err(|e| StoreError::transient(e.to_string()))?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn update_session(&self, id: &str, patch: &Map<String, Value>) -> StoreResult<()> {
        let Some(mut record) = self.get_session(id).await? else {
            return Ok(());
        };
        record.apply_patch(patch);
        self.create_session(record).await
    }

    async fn delete_session(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let events_key = format!("{}:events:{}", self.key_prefix, id);
        let _: () = conn
            .del::<_, ()>((self.session_key(id), events_key))
            .await
            .map_err(|e| StoreError::transient(e.to_string()))?;
        Ok(())
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let ttl_ms: i64 = ttl.as_millis().try_into().unwrap_or(i64::MAX);
        let result: Option<String> = redis::cmd("SET")
            .arg(self.lock_key(key))
            .arg("1")
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::transient(e.to_string()))?;
        Ok(result.is_some())
    }

    async fn release_lock(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.lock_key(key)).await.map_err(|e| StoreError::transient(e.to_string()))?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok()
    }
}
