//! In-memory `EventStore`, ported from `mcp_db.event.inmemory.InMemoryEventStore`.
//! Generalizes the teacher's single-session ring buffer
//! (`server/session.rs`'s `VecDeque` + `AtomicU64` + `tokio::sync::broadcast`)
//! into a map of ring buffers keyed by stream id, retaining the broadcast
//! channel for live SSE delivery alongside the replay-after-id query path.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};

use super::EventStore;
use crate::error::StoreResult;
use crate::model::EventRecord;

struct StreamState {
    events: VecDeque<EventRecord>,
    sender: broadcast::Sender<EventRecord>,
}

impl StreamState {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { events: VecDeque::new(), sender }
    }
}

struct Inner {
    streams: HashMap<String, StreamState>,
    /// event_id -> stream_id, a functional index pruned in lockstep with
    /// oldest-first eviction.
    index: HashMap<String, String>,
}

pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    /// Cap per stream; `None` is unbounded.
    cap_per_stream: Option<usize>,
}

impl InMemoryEventStore {
    #[must_use]
    pub fn new(cap_per_stream: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner { streams: HashMap::new(), index: HashMap::new() }),
            next_id: AtomicU64::new(1),
            cap_per_stream,
        }
    }

    /// Subscribe to live events on `stream_id` for SSE delivery. Creates the
    /// stream's broadcast channel if it does not yet exist.
    pub async fn subscribe(&self, stream_id: &str) -> broadcast::Receiver<EventRecord> {
        let mut guard = self.inner.lock().await;
        guard.streams.entry(stream_id.to_string()).or_insert_with(StreamState::new).sender.subscribe()
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new(Some(10_000))
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn store_event(&self, stream_id: &str, message: Value) -> StoreResult<String> {
        let event_id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let record = EventRecord { event_id: event_id.clone(), stream_id: stream_id.to_string(), message, ts: chrono::Utc::now() };

        let mut guard = self.inner.lock().await;
        let state = guard.streams.entry(stream_id.to_string()).or_insert_with(StreamState::new);
        state.events.push_back(record.clone());
        // Broadcast is best-effort: no subscribers is not an error.
        let _ = state.sender.send(record);

        if let Some(cap) = self.cap_per_stream {
            while state.events.len() > cap {
                if let Some(evicted) = state.events.pop_front() {
                    guard.index.remove(&evicted.event_id);
                }
            }
        }
        guard.index.insert(event_id.clone(), stream_id.to_string());
        Ok(event_id)
    }

    async fn replay_events_after(
        &self,
        last_event_id: &str,
        callback: &mut (dyn FnMut(Value) + Send),
    ) -> StoreResult<Option<String>> {
        let guard = self.inner.lock().await;
        let Some(stream_id) = guard.index.get(last_event_id).cloned() else {
            return Ok(None);
        };
        let Some(state) = guard.streams.get(&stream_id) else {
            return Ok(Some(stream_id));
        };

        let mut found_marker = false;
        for event in &state.events {
            if found_marker {
                callback(event.message.clone());
            } else if event.event_id == last_event_id {
                found_marker = true;
            }
        }
        Ok(Some(stream_id))
    }
}
