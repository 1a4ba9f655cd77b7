//! Admission controller (component C7): reconstructs the in-process engine
//! transport for a session id not originated on this node, and optionally
//! warms it. Ported from `mcp_db.core.admission`, replacing the Python
//! reference's dynamic transport-class resolution (`_resolve_transport_class`)
//! with the `McpEngine` trait boundary per `spec.md` §9's redesign guidance.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

/// Construction parameters for a reconstructed session transport, pulled
/// off the engine in the Python reference by reflection
/// (`json_response`/`event_store`/`security_settings`).
#[derive(Debug, Clone)]
pub struct TransportHint {
    pub json_response: bool,
    pub security_settings: Option<Value>,
}

/// The boundary to the out-of-scope JSON-RPC engine. An implementation
/// owns a per-process `session_id -> transport` mapping; this crate never
/// constructs a transport directly.
#[async_trait]
pub trait McpEngine: Send + Sync {
    /// True iff this node already holds a transport for `id`.
    fn has_session(&self, id: &str) -> bool;

    /// If `has_session(id)`, return immediately. Otherwise construct and
    /// register a transport for `id` using `hint`. Errors during
    /// construction must not propagate: implementations log and return
    /// silently, leaving the engine to produce its own not-found response
    /// on the next request.
    async fn ensure_session_transport(&self, id: &str, hint: TransportHint);

    /// Deliver `message` directly into the reconstructed transport for
    /// `id`, discarding any response. This is the hook warming uses to
    /// transition an admitted session's transport into the running state
    /// without involving the client (glossary: "Warming"; `spec.md` §4.8
    /// step 6). A no-op if `id` has no transport.
    async fn deliver_notification(&self, id: &str, message: Value);
}

/// Thin pass-through wrapping any `McpEngine`, adding the "warmed on this
/// node" bookkeeping the transport wrapper (C8) needs. The warmed set is a
/// `tokio::sync::Mutex<HashSet<String>>` — per-node state, never a global.
pub struct AdmissionController<E: McpEngine> {
    engine: Arc<E>,
    warmed: Mutex<HashSet<String>>,
}

impl<E: McpEngine> AdmissionController<E> {
    #[must_use]
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine, warmed: Mutex::new(HashSet::new()) }
    }

    #[must_use]
    pub fn has_session(&self, id: &str) -> bool {
        self.engine.has_session(id)
    }

    pub async fn ensure_session_transport(&self, id: &str, hint: TransportHint) {
        if self.has_session(id) {
            return;
        }
        self.engine.ensure_session_transport(id, hint).await;
    }

    /// Forward a synthesized notification straight to the engine's
    /// transport for `id`, discarding any response.
    pub async fn deliver_notification(&self, id: &str, message: Value) {
        self.engine.deliver_notification(id, message).await;
    }

    /// True iff this node has already emitted the synthetic
    /// `notifications/initialized` warm-up for `id`.
    pub async fn is_warmed(&self, id: &str) -> bool {
        self.warmed.lock().await.contains(id)
    }

    pub async fn mark_warmed(&self, id: &str) {
        self.warmed.lock().await.insert(id.to_string());
    }
}

/// Reference `McpEngine` for tests and the binary's demo server — the
/// admitted "external collaborator" stood in for testing purposes only,
/// analogous to the teacher's OAuth integration tests exercising an
/// in-process `OAuthStore` rather than a real provider.
pub struct LoopbackEngine {
    sessions: Mutex<HashSet<String>>,
    /// Ids that have had a notification delivered into their transport —
    /// stands in for the engine's own "transport is running" bit.
    notified: Mutex<HashSet<String>>,
}

impl LoopbackEngine {
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: Mutex::new(HashSet::new()), notified: Mutex::new(HashSet::new()) }
    }

    /// Synchronous membership check used by tests that don't want to await.
    #[must_use]
    pub fn known_sessions_blocking(&self) -> Vec<String> {
        self.sessions.try_lock().map(|guard| guard.iter().cloned().collect()).unwrap_or_default()
    }

    /// True iff `id`'s transport has received a delivered notification.
    #[must_use]
    pub fn was_notified_blocking(&self, id: &str) -> bool {
        self.notified.try_lock().map(|guard| guard.contains(id)).unwrap_or(false)
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl McpEngine for LoopbackEngine {
    fn has_session(&self, id: &str) -> bool {
        self.sessions.try_lock().map(|guard| guard.contains(id)).unwrap_or(false)
    }

    async fn ensure_session_transport(&self, id: &str, _hint: TransportHint) {
        if self.has_session(id) {
            return;
        }
        let mut guard = self.sessions.lock().await;
        guard.insert(id.to_string());
    }

    async fn deliver_notification(&self, id: &str, _message: Value) {
        if !self.has_session(id) {
            return;
        }
        self.notified.lock().await.insert(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_session_transport_is_idempotent() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = AdmissionController::new(engine.clone());

        assert!(!controller.has_session("s1"));
        controller.ensure_session_transport("s1", TransportHint { json_response: true, security_settings: None }).await;
        assert!(controller.has_session("s1"));

        // Second call is a no-op; duplicate construction is harmless but
        // unnecessary.
        controller.ensure_session_transport("s1", TransportHint { json_response: true, security_settings: None }).await;
        assert!(controller.has_session("s1"));
    }

    #[tokio::test]
    async fn test_warmed_set_is_per_node_and_explicit() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = AdmissionController::new(engine);
        assert!(!controller.is_warmed("s1").await);
        controller.mark_warmed("s1").await;
        assert!(controller.is_warmed("s1").await);
    }

    #[tokio::test]
    async fn test_construction_failure_never_propagates() {
        struct FailingEngine;
        #[async_trait]
        impl McpEngine for FailingEngine {
            fn has_session(&self, _id: &str) -> bool {
                false
            }
            async fn ensure_session_transport(&self, _id: &str, _hint: TransportHint) {
                warn!("simulated construction failure");
            }
            async fn deliver_notification(&self, _id: &str, _message: Value) {}
        }

        let controller = AdmissionController::new(Arc::new(FailingEngine));
        // Must not panic or return a Result — silent failure by contract.
        controller.ensure_session_transport("s1", TransportHint { json_response: false, security_settings: None }).await;
    }

    #[tokio::test]
    async fn test_deliver_notification_reaches_the_engine_transport() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = AdmissionController::new(engine.clone());

        controller.ensure_session_transport("s1", TransportHint { json_response: true, security_settings: None }).await;
        assert!(!engine.was_notified_blocking("s1"));

        controller.deliver_notification("s1", serde_json::json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).await;
        assert!(engine.was_notified_blocking("s1"));
    }

    #[tokio::test]
    async fn test_deliver_notification_is_a_noop_without_a_transport() {
        let engine = Arc::new(LoopbackEngine::new());
        let controller = AdmissionController::new(engine.clone());

        controller.deliver_notification("ghost", serde_json::json!({})).await;
        assert!(!engine.was_notified_blocking("ghost"));
    }
}
