//! Core data types shared across every component: the session record, its
//! lifecycle DAG, and the event record appended to a stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A session's position in the lifecycle DAG (`spec.md` §3).
///
/// ```text
/// INITIALIZING → INITIALIZED → ACTIVE → {SUSPENDED, CLOSED}
/// SUSPENDED → {ACTIVE (via RECOVERING), CLOSED}
/// RECOVERING → {ACTIVE, CLOSED}
/// CLOSED is terminal.
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Initializing,
    Initialized,
    Active,
    Suspended,
    Recovering,
    Closed,
}

impl SessionStatus {
    /// Returns true if `self -> next` is a legal edge in the lifecycle DAG.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SessionStatus::{Active, Closed, Initialized, Initializing, Recovering, Suspended};
        matches!(
            (self, next),
            (Initializing, Initialized)
                | (Initialized, Active)
                | (Initialized, Closed)
                | (Active, Suspended)
                | (Active, Closed)
                | (Suspended, Recovering)
                | (Suspended, Closed)
                | (Recovering, Active)
                | (Recovering, Closed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Durable record for one session (`spec.md` §3, component C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque, server-assigned, immutable identifier.
    pub id: String,
    pub status: SessionStatus,
    /// Free-form identifier for the client peer.
    pub client_id: Option<String>,
    /// Identifier of the node that first admitted the session.
    pub server_id: String,
    /// Capabilities negotiated at initialize.
    #[serde(default)]
    pub capabilities: Map<String, Value>,
    /// Open map for auxiliary annotations.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Last event id emitted on the session's default stream, if any.
    /// Written by an event-store consumer, never by this crate's session
    /// store mutators.
    pub last_event_id: Option<String>,
}

impl SessionRecord {
    /// Construct a freshly-created record with `created_at == updated_at`.
    #[must_use]
    pub fn new(id: impl Into<String>, status: SessionStatus, server_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status,
            client_id: None,
            server_id: server_id.into(),
            capabilities: Map::new(),
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
            last_event_id: None,
        }
    }

    /// Merge a partial JSON object over this record's top-level fields,
    /// matching `update_session`'s "read-modify-write, shallow merge"
    /// contract. Unknown keys are ignored; `updated_at` always advances.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) {
        if let Some(Value::String(s)) = patch.get("status") {
            if let Ok(status) = serde_json::from_value::<SessionStatus>(Value::String(s.clone())) {
                self.status = status;
            }
        }
        if let Some(v) = patch.get("client_id") {
            self.client_id = v.as_str().map(str::to_string);
        }
        if let Some(Value::Object(caps)) = patch.get("capabilities") {
            self.capabilities = caps.clone();
        }
        if let Some(Value::Object(meta)) = patch.get("metadata") {
            for (k, v) in meta {
                self.metadata.insert(k.clone(), v.clone());
            }
        }
        if let Some(v) = patch.get("last_event_id") {
            self.last_event_id = v.as_str().map(str::to_string);
        }
        self.updated_at = Utc::now();
    }
}

/// A server-originated message appended to a stream (`spec.md` §3,
/// component C4). `event_id` is backend-native: a monotonic integer for the
/// in-memory store, a Redis stream id string for the Redis store. Both
/// satisfy "totally ordered within one stream" without needing
/// cross-backend comparability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub stream_id: String,
    /// Opaque JSON-RPC envelope bytes, stored as a parsed value so both
    /// backends can serialize it uniformly; never re-derived from or
    /// compared against the original wire bytes.
    pub message: Value,
    pub ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionStatus::{Active, Closed, Initialized, Initializing, Recovering, Suspended};

    #[test]
    fn test_lifecycle_dag_legal_edges() {
        assert!(Initializing.can_transition_to(Initialized));
        assert!(Initialized.can_transition_to(Active));
        assert!(Active.can_transition_to(Suspended));
        assert!(Active.can_transition_to(Closed));
        assert!(Suspended.can_transition_to(Recovering));
        assert!(Suspended.can_transition_to(Closed));
        assert!(Recovering.can_transition_to(Active));
        assert!(Recovering.can_transition_to(Closed));
    }

    #[test]
    fn test_lifecycle_dag_illegal_edges() {
        assert!(!Initializing.can_transition_to(Active));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Active.can_transition_to(Initializing));
        assert!(!Suspended.can_transition_to(Initialized));
    }

    #[test]
    fn test_closed_is_terminal() {
        assert!(Closed.is_terminal());
        assert!(!Active.is_terminal());
    }

    #[test]
    fn test_apply_patch_merges_metadata_shallow() {
        let mut record = SessionRecord::new("s1", SessionStatus::Initialized, "node-a");
        record.metadata.insert("origin".to_string(), Value::String("node-a".to_string()));

        let mut patch = Map::new();
        let mut meta_patch = Map::new();
        meta_patch.insert("tag".to_string(), Value::String("warm".to_string()));
        patch.insert("metadata".to_string(), Value::Object(meta_patch));

        let before = record.updated_at;
        record.apply_patch(&patch);

        assert_eq!(record.metadata.get("origin").and_then(Value::as_str), Some("node-a"));
        assert_eq!(record.metadata.get("tag").and_then(Value::as_str), Some("warm"));
        assert!(record.updated_at >= before);
    }
}
