//! Bounded retries and a circuit breaker (component C1), ported from
//! `mcp_db.utils.resilience`. These are the primitives the session manager
//! (C5) wraps every store call in.

mod breaker;
mod retry;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::with_retries;
