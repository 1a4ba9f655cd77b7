//! Per-stream append-only event log with monotonic ids and replay-after
//! semantics (component C4).

mod memory;
mod redis_store;

pub use memory::InMemoryEventStore;
pub use redis_store::RedisEventStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;

/// Append-only log keyed by stream id, with a global event-id → stream-id
/// index supporting "replay everything after id X on stream σ".
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `message` to `stream_id`, assigning a store-unique event id
    /// that sorts after every prior id on this stream. Returns the new id.
    async fn store_event(&self, stream_id: &str, message: Value) -> StoreResult<String>;

    /// Look up the stream owning `last_event_id`; if found, invoke
    /// `callback` once per event strictly after it, in insertion order.
    /// Returns the resolved stream id, or `None` if `last_event_id` is
    /// unknown (in which case `callback` is never invoked).
    async fn replay_events_after(
        &self,
        last_event_id: &str,
        callback: &mut (dyn FnMut(Value) + Send),
    ) -> StoreResult<Option<String>>;
}
