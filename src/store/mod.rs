//! Durable session storage (component C3): a trait boundary plus an
//! in-memory reference implementation and a Redis-backed implementation.

mod memory;
mod redis_store;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;

use crate::error::StoreResult;
use crate::model::SessionRecord;

/// Durable mapping session-id → session record, plus advisory locking and a
/// health probe. All operations are idempotent on `id` unless noted.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert `record` by its id.
    async fn create_session(&self, record: SessionRecord) -> StoreResult<()>;

    /// Fetch the record for `id`, or `None` if absent.
    async fn get_session(&self, id: &str) -> StoreResult<Option<SessionRecord>>;

    /// Read-modify-write: merge `patch`'s top-level fields over the stored
    /// record. No-op if `id` is absent.
    async fn update_session(&self, id: &str, patch: &Map<String, Value>) -> StoreResult<()>;

    /// Remove the record and its associated event stream in one logical
    /// deletion.
    async fn delete_session(&self, id: &str) -> StoreResult<()>;

    /// Non-blocking advisory lock. Returns `true` exactly once across the
    /// fleet within `ttl`; `false` otherwise.
    async fn acquire_lock(&self, key: &str, ttl: std::time::Duration) -> StoreResult<bool>;

    /// Best-effort lock release.
    async fn release_lock(&self, key: &str) -> StoreResult<()>;

    async fn is_healthy(&self) -> bool;
}
