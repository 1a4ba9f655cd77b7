//! Client-initiated termination and malformed-input scenarios (`spec.md`
//! §8, scenarios 4 and 5).

use std::sync::Arc;
use std::time::Duration;

use mcp_relay::cache::LocalCache;
use mcp_relay::config::ResilienceConfig;
use mcp_relay::interceptor::{Forwarded, InterceptorContext, ProtocolInterceptor};
use mcp_relay::manager::SessionManager;
use mcp_relay::model::{SessionRecord, SessionStatus};
use mcp_relay::store::MemorySessionStore;

fn shared_manager() -> SessionManager {
    SessionManager::new(
        Box::new(MemorySessionStore::new()),
        Some(LocalCache::new(100, Duration::from_secs(60))),
        &ResilienceConfig::default(),
    )
}

#[tokio::test]
async fn test_malformed_json_forwards_raw_bytes_and_writes_no_session_state() {
    let manager = shared_manager();
    let interceptor = ProtocolInterceptor::new(&manager);

    let mut context = InterceptorContext::new("node-a");
    context.headers.insert("Mcp-Session-Id".to_string(), "sess-broken".to_string());

    let malformed = b"not-json{";
    let forwarded = interceptor.handle_incoming(malformed, &mut context).await;

    match forwarded {
        Forwarded::Raw(bytes) => assert_eq!(bytes, malformed),
        Forwarded::Parsed(_) => panic!("malformed input must never parse"),
    }
    assert!(manager.get("sess-broken").await.unwrap().is_none());
}

#[tokio::test]
async fn test_terminate_known_session_then_second_lookup_finds_nothing() {
    let manager = shared_manager();
    manager.create(SessionRecord::new("sess-1", SessionStatus::Active, "node-a")).await.unwrap();

    assert!(manager.get("sess-1").await.unwrap().is_some());
    manager.delete("sess-1").await.unwrap();

    // A subsequent request bearing the same Mcp-Session-Id now finds no
    // session: the engine's own DELETE handler maps this to 404.
    assert!(manager.get("sess-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_terminate_unknown_session_is_a_noop_not_an_error() {
    let manager = shared_manager();
    assert!(manager.get("never-existed").await.unwrap().is_none());
    // Deleting an absent id must not error; stores treat it as a no-op.
    manager.delete("never-existed").await.unwrap();
}
