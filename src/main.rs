//! Binary entry point: wires configuration to the eight relay components
//! and an axum HTTP server fronting a minimal reference engine, so the
//! crate is runnable end-to-end for manual testing. The reference engine
//! (`DemoEngine` below) stands in for the out-of-scope JSON-RPC engine —
//! real integrators link their own.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use futures::stream::{self, Stream, StreamExt};
use mcp_relay::admission::{AdmissionController, LoopbackEngine};
use mcp_relay::cache::LocalCache;
use mcp_relay::config::{Config, StoreBackend};
use mcp_relay::event::InMemoryEventStore;
use mcp_relay::manager::SessionManager;
use mcp_relay::store::{MemorySessionStore, RedisSessionStore, SessionStore};
use mcp_relay::transport::{relay_router, RelayState};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Parser, Debug)]
#[command(name = "mcp-relay", version, about = "Session-fleet relay for streamable-HTTP MCP servers")]
struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "MCP_RELAY_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, env = "MCP_RELAY_JSON_LOGS")]
    json_logs: bool,

    /// This node's identifier, used as `server_id` on sessions it admits.
    #[arg(long, env = "MCP_RELAY_NODE_ID", default_value = "node-local")]
    node_id: String,
}

fn init_tracing(json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = Config::from_env()?;
    tracing::info!(node_id = %cli.node_id, bind = %cli.bind, "starting mcp-relay");

    let store: Box<dyn SessionStore> = match config.store.backend {
        StoreBackend::InMemory => Box::new(MemorySessionStore::new()),
        StoreBackend::ExternalKv => {
            let conn_str = config
                .store
                .connection_string
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("MCP_RELAY_STORE_URL required for external-kv backend"))?;
            Box::new(RedisSessionStore::connect(conn_str, &config.store.key_prefix).await?)
        }
    };

    let cache = config.cache.enabled.then(|| LocalCache::new(config.cache.max_size, config.cache.ttl));
    let manager = Arc::new(SessionManager::new(store, cache, &config.resilience));
    let events = Arc::new(InMemoryEventStore::new(config.store.stream_cap));
    let engine = Arc::new(LoopbackEngine::new());
    let admission = Arc::new(AdmissionController::new(engine));

    let state = Arc::new(RelayState { manager, admission, events, server_id: cli.node_id.clone() });

    let inner = demo_engine_router(state.clone());
    let app = relay_router(inner, state)
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    tracing::info!(addr = %cli.bind, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "mcp-relay", "version": env!("CARGO_PKG_VERSION")}))
}

/// The reference "engine" router the relay middleware wraps for the demo
/// binary: a handful of JSON-RPC methods, plus the SSE subscription and
/// DELETE-termination surface from `spec.md` §6. Any real deployment
/// replaces this with the actual engine's own router.
fn demo_engine_router(state: Arc<RelayState<LoopbackEngine>>) -> Router {
    Router::new()
        .route("/mcp", post(handle_post).get(handle_get).delete(handle_delete))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
    #[serde(default)]
    id: Option<serde_json::Value>,
}

async fn handle_post(
    State(_state): State<Arc<RelayState<LoopbackEngine>>>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    debug_assert_eq!(req.jsonrpc, "2.0");
    let is_notification = req.id.is_none();

    // The engine, not the relay, assigns session ids (`spec.md` §1
    // Non-goals). Stamp the required `Mcp-Session-Id` header on the
    // initialize response (`spec.md` §6) so the wrapper's response-path
    // observation has an id to create the session record under.
    if req.method == "initialize" {
        let session_id = uuid::Uuid::new_v4().to_string();
        let response = serde_json::json!({
            "jsonrpc": "2.0",
            "id": req.id,
            "result": {
                "protocolVersion": req.params.get("protocolVersion").cloned().unwrap_or(serde_json::json!("2024-11-05")),
                "capabilities": {},
                "serverInfo": {"name": "mcp-relay-demo-engine", "version": env!("CARGO_PKG_VERSION")},
            },
        });
        let mut resp = Json(response).into_response();
        if let Ok(value) = axum::http::HeaderValue::from_str(&session_id) {
            resp.headers_mut().insert("mcp-session-id", value);
        }
        return resp;
    }

    let response = match req.method.as_str() {
        "notifications/initialized" | "initialized" | "notifications/cancelled" => {
            if is_notification {
                return StatusCode::ACCEPTED.into_response();
            }
            serde_json::json!({"jsonrpc": "2.0", "id": req.id, "result": {}})
        }
        "tools/list" => serde_json::json!({"jsonrpc": "2.0", "id": req.id, "result": {"tools": []}}),
        "ping" => serde_json::json!({"jsonrpc": "2.0", "id": req.id, "result": {}}),
        other => {
            if is_notification {
                return StatusCode::ACCEPTED.into_response();
            }
            serde_json::json!({
                "jsonrpc": "2.0", "id": req.id,
                "error": {"code": -32601, "message": format!("method not found: {other}")},
            })
        }
    };

    Json(response).into_response()
}

#[derive(Debug, Deserialize)]
struct SseQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn handle_get(
    State(state): State<Arc<RelayState<LoopbackEngine>>>,
    headers: HeaderMap,
    Query(query): Query<SseQuery>,
) -> impl IntoResponse {
    let Some(stream_id) = query.session_id else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let last_event_id = headers.get("Last-Event-ID").and_then(|v| v.to_str().ok()).map(str::to_string);

    let stream = build_sse_stream(state, stream_id, last_event_id).await;
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping")).into_response()
}

async fn build_sse_stream(
    state: Arc<RelayState<LoopbackEngine>>,
    stream_id: String,
    last_event_id: Option<String>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    let mut replayed = Vec::new();
    if let Some(last_event_id) = last_event_id {
        let events = state.events.clone();
        let mut collected = Vec::new();
        let _ = events.replay_events_after(&last_event_id, &mut |msg| collected.push(msg)).await;
        replayed = collected;
    }
    let replay_stream = stream::iter(replayed.into_iter().map(|msg| {
        Ok::<_, std::convert::Infallible>(Event::default().data(msg.to_string()))
    }));

    let receiver = state.events.subscribe(&stream_id).await;
    let live_stream = tokio_stream::wrappers::BroadcastStream::new(receiver).filter_map(|result| async move {
        match result {
            Ok(event) => Some(Ok(Event::default().id(event.event_id).data(event.message.to_string()))),
            Err(_lag) => None,
        }
    });

    replay_stream.chain(live_stream)
}

async fn handle_delete(
    State(state): State<Arc<RelayState<LoopbackEngine>>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(session_id) = headers.get("Mcp-Session-Id").and_then(|v| v.to_str().ok()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match state.manager.get(session_id).await {
        Ok(Some(_)) => {
            let _ = state.manager.delete(session_id).await;
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
