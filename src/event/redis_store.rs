//! Redis-backed `EventStore`, ported from `mcp_db.event.redis.RedisEventStore`.
//! Appends go through `XADD`; the global event-id → stream-id index is a
//! single hash at `{prefix}:event_index`; replay uses `XRANGE key (last_id +`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;

use super::EventStore;
use crate::error::{StoreError, StoreResult};

pub struct RedisEventStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisEventStore {
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

    fn stream_key(&self, stream_id: &str) -> String {
        format!("{}:events:{}", self.key_prefix, stream_id)
    }

    fn index_key(&self) -> String {
        format!("{}:event_index", self.key_prefix)
    }
}

#[async_trait]
impl EventStore for RedisEventStore {
    async fn store_event(&self, stream_id: &str, message: Value) -> StoreResult<String> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&message)?;
        let event_id: String = conn
            .xadd(self.stream_key(stream_id), "*", &[("message", payload.as_str())])
            .await
            .map_err(|e| StoreError::transient(e.to_string()))?;

        let _: () = conn
            .hset(self.index_key(), &event_id, stream_id)
            .await
            .map_err(|e| StoreError::transient(e.to_string()))?;

        Ok(event_id)
    }

    async fn replay_events_after(
        &self,
        last_event_id: &str,
        callback: &mut (dyn FnMut(Value) + Send),
    ) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let stream_id: Option<String> = conn
            .hget(self.index_key(), last_event_id)
            .await
            .map_err(|e| StoreError::transient(e.to_string()))?;
        let Some(stream_id) = stream_id else {
            return Ok(None);
        };

        // Redis Streams has no native exclusive-start range query; `(id`
        // is the documented syntax for "strictly after `id`" (see `XRANGE`).
        let exclusive_start = format!("({last_event_id}");
        let reply: redis::streams::StreamRangeReply = conn
            .xrange(self.stream_key(&stream_id), exclusive_start, "+")
            .await
            .map_err(|e| StoreError::transient(e.to_string()))?;

        for entry in reply.ids {
            if let Some(payload) = entry.get::<String>("message") {
                let message: Value = serde_json::from_str(&payload)?;
                callback(message);
            }
        }

        Ok(Some(stream_id))
    }
}
