//! Session manager (component C5): composes the local cache (C2) and
//! session store (C3) behind the resilience primitives (C1). Ported from
//! `mcp_db.core.session_manager.SessionManager`.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::cache::LocalCache;
use crate::config::ResilienceConfig;
use crate::error::StoreResult;
use crate::model::SessionRecord;
use crate::resilience::{with_retries, CircuitBreaker, CircuitBreakerConfig};
use crate::store::SessionStore;

/// The sole mutator of local cache state. Every public operation runs the
/// store call under the circuit breaker and, inside the breaker, under the
/// retry wrapper.
pub struct SessionManager {
    store: Box<dyn SessionStore>,
    cache: Option<LocalCache<SessionRecord>>,
    breaker: CircuitBreaker,
    retry_attempts: u32,
    retry_backoff_ms: Vec<u64>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: Box<dyn SessionStore>,
        cache: Option<LocalCache<SessionRecord>>,
        resilience: &ResilienceConfig,
    ) -> Self {
        Self {
            store,
            cache,
            breaker: CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: resilience.breaker_failure_threshold,
                reset_timeout: resilience.breaker_reset_timeout,
            }),
            retry_attempts: resilience.retry_attempts,
            retry_backoff_ms: resilience.retry_backoff_ms.clone(),
        }
    }

    async fn run_with_resilience<T, F, Fut>(&self, op: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        self.breaker
            .run(|| with_retries(&op, self.retry_attempts, &self.retry_backoff_ms))
            .await
    }

    pub async fn create(&self, session: SessionRecord) -> StoreResult<()> {
        let to_store = session.clone();
        self.run_with_resilience(|| {
            let record = to_store.clone();
            let store = &self.store;
            async move { store.create_session(record).await }
        })
        .await?;
        if let Some(cache) = &self.cache {
            cache.set(session.id.clone(), session).await;
        }
        Ok(())
    }

    pub async fn get(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(session_id).await {
                return Ok(Some(cached));
            }
        }

        let fetched = self
            .run_with_resilience(|| {
                let store = &self.store;
                async move { store.get_session(session_id).await }
            })
            .await?;

        if let (Some(record), Some(cache)) = (&fetched, &self.cache) {
            cache.set(session_id.to_string(), record.clone()).await;
        }
        Ok(fetched)
    }

    pub async fn update(&self, session_id: &str, patch: &Map<String, Value>) -> StoreResult<()> {
        self.run_with_resilience(|| {
            let store = &self.store;
            async move { store.update_session(session_id, patch).await }
        })
        .await?;

        if let Some(cache) = &self.cache {
            if let Some(record) = self.store.get_session(session_id).await? {
                cache.set(session_id.to_string(), record).await;
            }
        }
        Ok(())
    }

    pub async fn delete(&self, session_id: &str) -> StoreResult<()> {
        self.run_with_resilience(|| {
            let store = &self.store;
            async move { store.delete_session(session_id).await }
        })
        .await?;
        if let Some(cache) = &self.cache {
            cache.delete(session_id).await;
        }
        Ok(())
    }

    /// No-op: per-session event persistence is the engine's streaming
    /// transport's responsibility (component C4), not this manager's.
    /// Kept as a documented no-op matching `session_manager.py`'s own
    /// comment, rather than becoming a second writer into the event store.
    pub async fn append_event(&self, _stream_id: &str, _message: Value) -> StoreResult<()> {
        Ok(())
    }

    /// Return the current record for `session_id`. No event-folding
    /// happens at this layer; the engine's streaming transport handles
    /// event replay on reconnect via C4.
    pub async fn recover(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        self.get(session_id).await
    }

    pub async fn acquire_lock(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.store.acquire_lock(key, ttl).await
    }

    pub async fn release_lock(&self, key: &str) -> StoreResult<()> {
        self.store.release_lock(key).await
    }
}
