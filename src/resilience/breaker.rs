use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::StoreError;

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(30) }
    }
}

/// Breaker state. `Open` carries the instant it was opened so elapsed time
/// against `reset_timeout` can be computed without a second field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    consecutive_failures: u32,
}

/// Three-state (CLOSED/OPEN/HALF_OPEN) fail-fast wrapper protecting a
/// fallible async operation, per `mcp_db.utils.resilience.CircuitBreaker`.
/// Only attempted calls count toward `failure_threshold`; short-circuited
/// calls while `Open` never touch the failure counter.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner { state: CircuitState::Closed, opened_at: None, consecutive_failures: 0 }),
        }
    }

    #[must_use]
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Run `op` through the breaker. Returns `StoreError::CircuitOpen`
    /// without attempting `op` while the breaker is `Open` and
    /// `reset_timeout` has not elapsed.
    pub async fn run<T, Fut, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        {
            let mut guard = self.inner.lock().await;
            match guard.state {
                CircuitState::Open => {
                    let elapsed = guard.opened_at.map(|at| at.elapsed()).unwrap_or(Duration::MAX);
                    if elapsed < self.config.reset_timeout {
                        return Err(StoreError::CircuitOpen);
                    }
                    guard.state = CircuitState::HalfOpen;
                }
                CircuitState::Closed | CircuitState::HalfOpen => {}
            }
        }

        match op().await {
            Ok(value) => {
                let mut guard = self.inner.lock().await;
                guard.state = CircuitState::Closed;
                guard.consecutive_failures = 0;
                guard.opened_at = None;
                Ok(value)
            }
            Err(err) => {
                let mut guard = self.inner.lock().await;
                guard.consecutive_failures += 1;
                if guard.consecutive_failures >= self.config.failure_threshold
                    || guard.state == CircuitState::HalfOpen
                {
                    guard.state = CircuitState::Open;
                    guard.opened_at = Some(Instant::now());
                }
                Err(err)
            }
        }
    }
}
