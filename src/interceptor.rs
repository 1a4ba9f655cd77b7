//! Protocol interceptor (component C6): classifies incoming and outgoing
//! JSON-RPC traffic and drives session lifecycle transitions through the
//! session manager. Stateless with respect to sessions — all state changes
//! go through `SessionManager`. Ported from `mcp_db.core.interceptor`.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::manager::SessionManager;
use crate::model::{SessionRecord, SessionStatus};

/// A parsed JSON-RPC envelope: request, notification, or response. The core
/// only extracts method/params/id; it never schema-validates further.
#[derive(Debug, Clone)]
pub struct JsonRpcEnvelope {
    pub method: Option<String>,
    pub params: Option<Value>,
    pub id: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<Value>,
}

impl JsonRpcEnvelope {
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            method: obj.get("method").and_then(Value::as_str).map(str::to_string),
            params: obj.get("params").cloned(),
            id: obj.get("id").cloned(),
            result: obj.get("result").cloned(),
            error: obj.get("error").cloned(),
        })
    }
}

/// The forwarded form of a message observed by the wrapper: either a
/// successfully parsed envelope, or the original opaque bytes when parsing
/// failed. Never collapse `Raw` back through `serde_json` — that would
/// violate the byte-faithful forwarding guarantee in `spec.md` §8.
#[derive(Debug, Clone)]
pub enum Forwarded {
    Parsed(JsonRpcEnvelope),
    Raw(Vec<u8>),
}

/// Per-request context bag threaded through `handle_incoming`/`handle_outgoing`,
/// replacing the Python dict's `_mcp_db_last_method` / `_mcp_db_init_params` /
/// `_mcp_db_session_id` keys with explicit fields per `spec.md` §9.
#[derive(Debug, Clone, Default)]
pub struct InterceptorContext {
    pub headers: HashMap<String, String>,
    pub server_id: String,
    pub last_method: Option<String>,
    pub init_params: Option<Value>,
    pub session_id: Option<String>,
}

impl InterceptorContext {
    #[must_use]
    pub fn new(server_id: impl Into<String>) -> Self {
        Self { server_id: server_id.into(), ..Default::default() }
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers.iter().find(|(k, _)| k.to_ascii_lowercase() == name).map(|(_, v)| v.as_str())
    }
}

pub struct ProtocolInterceptor<'a> {
    manager: &'a SessionManager,
}

impl<'a> ProtocolInterceptor<'a> {
    #[must_use]
    pub fn new(manager: &'a SessionManager) -> Self {
        Self { manager }
    }

    /// Extract a session id with precedence: `params.session_id`, then
    /// header `mcp-session-id`, then `x-mcp-session-id`, then
    /// `last-event-id` (a resumption hint only, never authoritative state).
    fn extract_session_id(envelope: &JsonRpcEnvelope, context: &InterceptorContext) -> Option<String> {
        if let Some(id) = envelope
            .params
            .as_ref()
            .and_then(Value::as_object)
            .and_then(|p| p.get("session_id"))
            .and_then(Value::as_str)
        {
            return Some(id.to_string());
        }
        if let Some(id) = context.header("mcp-session-id") {
            return Some(id.to_string());
        }
        if let Some(id) = context.header("x-mcp-session-id") {
            return Some(id.to_string());
        }
        context.header("last-event-id").map(str::to_string)
    }

    /// Parse `raw_bytes` as a JSON-RPC envelope and classify it. On parse
    /// failure, returns `Forwarded::Raw` with the original bytes untouched
    /// and writes no session state.
    pub async fn handle_incoming(&self, raw_bytes: &[u8], context: &mut InterceptorContext) -> Forwarded {
        let Ok(value) = serde_json::from_slice::<Value>(raw_bytes) else {
            return Forwarded::Raw(raw_bytes.to_vec());
        };
        let Some(envelope) = JsonRpcEnvelope::from_value(&value) else {
            return Forwarded::Raw(raw_bytes.to_vec());
        };

        if let Some(id) = Self::extract_session_id(&envelope, context) {
            context.session_id = Some(id);
        }

        match envelope.method.as_deref() {
            Some("initialize") => {
                context.init_params = envelope.params.clone();
                context.last_method = Some("initialize".to_string());
                if let Some(session_id) = &context.session_id {
                    self.append_event(session_id, "MessageReceivedEvent", &envelope).await;
                }
            }
            Some("notifications/initialized" | "initialized") => {
                context.last_method = Some("notifications/initialized".to_string());
                if let Some(session_id) = context.session_id.clone() {
                    let mut patch = Map::new();
                    patch.insert(
                        "status".to_string(),
                        serde_json::to_value(SessionStatus::Active).expect("SessionStatus always serializes"),
                    );
                    let _ = self.manager.update(&session_id, &patch).await;
                    self.append_event(&session_id, "SessionInitializedEvent", &envelope).await;
                }
            }
            Some(method) => {
                context.last_method = Some(method.to_string());
                if let Some(session_id) = &context.session_id {
                    self.append_event(session_id, "MessageReceivedEvent", &envelope).await;
                }
            }
            None => {}
        }

        Forwarded::Parsed(envelope)
    }

    /// Observe an outgoing response. If the last seen incoming method was
    /// `initialize`, or the session doesn't yet exist, creates a session
    /// record in status `INITIALIZED` (the deliberate redesign documented
    /// against the Python reference's `INITIALIZING`). If the outgoing
    /// message is `server/disconnect`, transitions the session to `CLOSED`.
    pub async fn handle_outgoing(&self, response: &Value, context: &InterceptorContext) -> Value {
        let Some(session_id) = context.session_id.clone() else {
            return response.clone();
        };

        let existing = self.manager.get(&session_id).await.ok().flatten();
        let should_create = context.last_method.as_deref() == Some("initialize") || existing.is_none();

        if should_create {
            let client_id = context
                .init_params
                .as_ref()
                .and_then(Value::as_object)
                .and_then(|p| p.get("client_id"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let capabilities = context
                .init_params
                .as_ref()
                .and_then(Value::as_object)
                .and_then(|p| p.get("capabilities"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            let mut record = SessionRecord::new(session_id.clone(), SessionStatus::Initialized, context.server_id.clone());
            record.client_id = client_id;
            record.capabilities = capabilities;
            record.metadata.insert("origin".to_string(), Value::String(context.server_id.clone()));

            let _ = self.manager.create(record).await;
            self.append_event(&session_id, "SessionCreatedEvent", response).await;
        }
        self.append_event(&session_id, "MessageSentEvent", response).await;

        if response.get("method").and_then(Value::as_str) == Some("server/disconnect") {
            let mut patch = Map::new();
            patch.insert("status".to_string(), Value::String("CLOSED".to_string()));
            if self.manager.get(&session_id).await.ok().flatten().is_some() {
                let _ = self.manager.update(&session_id, &patch).await;
                self.append_event(&session_id, "SessionClosedEvent", response).await;
            }
            // Else: lifecycle-violation per spec.md §7 — logged, no mutation.
        }

        response.clone()
    }

    /// Best-effort lifecycle-event hook. `SessionManager::append_event` is a
    /// documented no-op; this call exists so future wiring of a real event
    /// sink (the engine's own streaming transport) has a single call site.
    async fn append_event(&self, session_id: &str, _kind: &str, envelope: impl Into<EventPayload>) {
        let _ = self.manager.append_event(session_id, envelope.into().0).await;
    }
}

struct EventPayload(Value);

impl From<&JsonRpcEnvelope> for EventPayload {
    fn from(envelope: &JsonRpcEnvelope) -> Self {
        Self(serde_json::json!({
            "method": envelope.method,
            "params": envelope.params,
        }))
    }
}

impl From<&Value> for EventPayload {
    fn from(value: &Value) -> Self {
        Self(value.clone())
    }
}
