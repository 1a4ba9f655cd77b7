//! Error types for the relay.
//!
//! Uses `thiserror` for structured error handling with automatic `From`
//! implementations. `StoreError` covers the storage/cache boundary (C1-C4);
//! `RelayError` is the umbrella type surfaced by the interceptor, admission
//! controller, and transport wrapper (C5-C8).

/// Errors from the storage layer: session store, event store, and the
/// resilience primitives (retry, circuit breaker) wrapped around them.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The backing store is unreachable or returned a transient failure.
    /// Distinguished from `CircuitOpen` so retry logic can tell "this one
    /// failed" from "we stopped even trying."
    #[error("store operation failed: {0}")]
    Transient(String),

    /// The circuit breaker guarding this store is open; the operation was
    /// rejected without being attempted.
    #[error("circuit breaker open, rejecting store operation")]
    CircuitOpen,

    /// No record exists for the requested key.
    #[error("not found: {0}")]
    NotFound(String),

    /// An advisory lock could not be acquired within the configured window.
    #[error("lock contended: {0}")]
    LockContended(String),

    /// The store returned data that failed to deserialize.
    #[error("corrupt record: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    #[must_use]
    pub fn lock_contended(key: impl Into<String>) -> Self {
        Self::LockContended(key.into())
    }

    /// Returns true if retrying this operation might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::LockContended(_))
    }
}

/// Errors surfaced at the relay boundary: malformed JSON-RPC traffic,
/// lifecycle violations, and failures bubbled up from the engine or store.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    /// The request/response body could not be parsed as JSON-RPC.
    #[error("malformed JSON-RPC payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// A message was classified as invalid given the session's current
    /// lifecycle state (e.g. a non-initialize request on a session that
    /// doesn't exist yet).
    #[error("lifecycle violation: {0}")]
    LifecycleViolation(String),

    /// The in-process engine could not service the session (admission or
    /// dispatch failure).
    #[error("engine error: {0}")]
    Engine(String),

    /// Propagated from the storage layer.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RelayError {
    #[must_use]
    pub fn lifecycle_violation(message: impl Into<String>) -> Self {
        Self::LifecycleViolation(message.into())
    }

    #[must_use]
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Convert to a user-facing JSON-RPC error message. Internal detail is
    /// kept out of `Store`/`Engine` variants so storage backend internals
    /// never leak to a client.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::Parse(_) => "invalid JSON-RPC message".to_string(),
            Self::LifecycleViolation(message) => message.clone(),
            Self::Engine(_) | Self::Store(_) => "internal relay error".to_string(),
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
