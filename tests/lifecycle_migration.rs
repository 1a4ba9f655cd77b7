//! Cross-node migration scenarios (`spec.md` §8, scenarios 1 and 2): a
//! session admitted on node A is observed ACTIVE on node B, which
//! reconstructs the transport and warms it without involving the client.

use std::sync::Arc;
use std::time::Duration;

use mcp_relay::admission::{AdmissionController, LoopbackEngine, TransportHint};
use mcp_relay::cache::LocalCache;
use mcp_relay::config::ResilienceConfig;
use mcp_relay::interceptor::{InterceptorContext, ProtocolInterceptor};
use mcp_relay::manager::SessionManager;
use mcp_relay::model::SessionStatus;
use mcp_relay::store::MemorySessionStore;

fn shared_manager() -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        Box::new(MemorySessionStore::new()),
        Some(LocalCache::new(100, Duration::from_secs(60))),
        &ResilienceConfig::default(),
    ))
}

#[tokio::test]
async fn test_graceful_migration_node_b_admits_active_session() {
    // Node A: initialize handshake creates the session and activates it.
    let manager = shared_manager();
    let interceptor_a = ProtocolInterceptor::new(&manager);

    let mut context_a = InterceptorContext::new("node-a");
    context_a.session_id = Some("sess-1".to_string());
    context_a.last_method = Some("initialize".to_string());
    context_a.init_params = Some(serde_json::json!({"client_id": "client-x"}));
    let init_response = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {}});
    interceptor_a.handle_outgoing(&init_response, &context_a).await;

    let mut context_a2 = InterceptorContext::new("node-a");
    context_a2.session_id = Some("sess-1".to_string());
    let notified = serde_json::json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    interceptor_a.handle_incoming(notified.to_string().as_bytes(), &mut context_a2).await;

    let record = manager.get("sess-1").await.unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::Active);
    assert_eq!(record.server_id, "node-a");

    // Node B: never saw this session locally. Admission reconstructs the
    // transport from the shared store's ACTIVE status and warms it once.
    let engine_b = Arc::new(LoopbackEngine::new());
    let admission_b = AdmissionController::new(engine_b);

    assert!(!admission_b.has_session("sess-1"));
    let fetched = manager.get("sess-1").await.unwrap().unwrap();
    assert_eq!(fetched.status, SessionStatus::Active);

    admission_b
        .ensure_session_transport("sess-1", TransportHint { json_response: true, security_settings: None })
        .await;
    assert!(admission_b.has_session("sess-1"));

    assert!(!admission_b.is_warmed("sess-1").await);
    admission_b.mark_warmed("sess-1").await;
    assert!(admission_b.is_warmed("sess-1").await);
}

#[tokio::test]
async fn test_crash_migration_node_b_recovers_without_node_a() {
    let manager = shared_manager();
    let interceptor_a = ProtocolInterceptor::new(&manager);

    let mut context = InterceptorContext::new("node-a");
    context.session_id = Some("sess-2".to_string());
    context.last_method = Some("initialize".to_string());
    let init_response = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {}});
    interceptor_a.handle_outgoing(&init_response, &context).await;

    let mut context2 = InterceptorContext::new("node-a");
    context2.session_id = Some("sess-2".to_string());
    let notified = serde_json::json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    interceptor_a.handle_incoming(notified.to_string().as_bytes(), &mut context2).await;

    // Node A is gone; node B only has the shared store.
    drop(interceptor_a);

    let record = manager.get("sess-2").await.unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::Active);

    let engine_b = Arc::new(LoopbackEngine::new());
    let admission_b = AdmissionController::new(engine_b);
    admission_b
        .ensure_session_transport("sess-2", TransportHint { json_response: true, security_settings: None })
        .await;
    assert!(admission_b.has_session("sess-2"));

    // The next outgoing response on B reflects B as the responding node.
    let interceptor_b = ProtocolInterceptor::new(&manager);
    let mut context_b = InterceptorContext::new("node-b");
    context_b.session_id = Some("sess-2".to_string());
    let tool_response = serde_json::json!({"jsonrpc": "2.0", "id": 2, "result": {"content": []}});
    interceptor_b.handle_outgoing(&tool_response, &context_b).await;

    // Existing session is not recreated (status unchanged, still ACTIVE).
    let record = manager.get("sess-2").await.unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::Active);
}
