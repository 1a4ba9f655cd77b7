//! Transport wrapper (component C8): sits on the HTTP boundary. Buffers
//! request bodies, observes JSON and SSE responses, and drives C6/C7.
//! Ported from `mcp_db.core.asgi_wrapper.ASGITransportWrapper`, realized as
//! an axum middleware instead of an ASGI `(scope, receive, send)` triple.

mod sse;
mod wrapper;

pub use sse::extract_sse_data_lines;
pub use wrapper::{relay_router, RelayState};
