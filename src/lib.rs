//! mcp-relay
//!
//! Turns a request/response JSON-RPC server fronted by an HTTP streaming
//! transport into a horizontally scalable, stateless fleet behind an
//! arbitrary load balancer. Clients obtain a server-assigned session
//! identifier on initialization; any node in the fleet may thereafter
//! accept any request bearing that identifier and transparently
//! reconstruct the necessary in-process session transport, replaying
//! missed server-sent events when the client resumes a broken stream.
//!
//! # Components
//!
//! - [`resilience`] — bounded retries and a circuit breaker (C1)
//! - [`cache`] — bounded, recency-ordered local cache with TTL (C2)
//! - [`store`] — durable session storage (C3)
//! - [`event`] — per-stream append log with replay-after semantics (C4)
//! - [`manager`] — composes cache and store behind resilience (C5)
//! - [`interceptor`] — classifies JSON-RPC traffic, drives lifecycle (C6)
//! - [`admission`] — reconstructs in-process engine transports (C7)
//! - [`transport`] — the HTTP-boundary middleware (C8)

pub mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod interceptor;
pub mod manager;
pub mod model;
pub mod resilience;
pub mod store;
pub mod transport;

pub use config::Config;
pub use error::{RelayError, StoreError};
pub use manager::SessionManager;
pub use model::{EventRecord, SessionRecord, SessionStatus};
