//! Configuration for the relay: storage backend, cache, session, and
//! resilience knobs. Ported from the reference `mcp_db.utils.config`
//! dataclasses, with `Default` impls carrying the same numeric defaults.

use std::time::Duration;

/// Which session/event store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Process-local, non-durable store. Used for tests and as a
    /// degraded-mode fallback when the external store is unreachable.
    #[default]
    InMemory,
    /// Redis (or Redis-protocol-compatible) key/value + streams backend.
    ExternalKv,
}

/// Storage layer configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Connection string for `ExternalKv` (ignored for `InMemory`).
    pub connection_string: Option<String>,
    /// Key prefix applied to all session/event/lock keys.
    pub key_prefix: String,
    /// Optional cap on events retained per stream; `None` means unbounded.
    pub stream_cap: Option<usize>,
    pub connection_pool_size: u32,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::InMemory,
            connection_string: None,
            key_prefix: "mcp".to_string(),
            stream_cap: Some(10_000),
            connection_pool_size: 20,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Local read-through cache configuration (component C2).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size: u64,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, max_size: 1000, ttl: Duration::from_secs(60) }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl: Duration,
    pub max_events_per_session: usize,
    pub snapshot_interval: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_events_per_session: 10_000,
            snapshot_interval: 100,
        }
    }
}

/// Resilience primitives configuration (component C1).
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub circuit_breaker_enabled: bool,
    pub fallback_to_memory: bool,
    pub retry_attempts: u32,
    pub retry_backoff_ms: Vec<u64>,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_breaker_enabled: true,
            fallback_to_memory: true,
            retry_attempts: 3,
            retry_backoff_ms: vec![100, 500, 2000],
            breaker_failure_threshold: 5,
            breaker_reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub resilience: ResilienceConfig,
}

impl Config {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric environment variable is set but does
    /// not parse (e.g. `MCP_RELAY_RETRY_BACKOFF_MS` not a comma-separated
    /// list of integers).
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("MCP_RELAY_STORE_URL") {
            config.store.backend = StoreBackend::ExternalKv;
            config.store.connection_string = Some(url);
        }
        if let Ok(prefix) = std::env::var("MCP_RELAY_KEY_PREFIX") {
            config.store.key_prefix = prefix;
        }
        if let Ok(ttl) = std::env::var("MCP_RELAY_CACHE_TTL_SECS") {
            config.cache.ttl = Duration::from_secs(ttl.parse()?);
        }
        if let Ok(size) = std::env::var("MCP_RELAY_CACHE_MAX_SIZE") {
            config.cache.max_size = size.parse()?;
        }
        if let Ok(backoff) = std::env::var("MCP_RELAY_RETRY_BACKOFF_MS") {
            config.resilience.retry_backoff_ms =
                backoff.split(',').map(|s| s.trim().parse()).collect::<Result<_, _>>()?;
        }

        Ok(config)
    }

    /// A configuration suited to unit/integration tests: in-memory store,
    /// cache enabled but tiny, fast retries, low breaker thresholds.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::InMemory,
                connection_string: None,
                key_prefix: "test".to_string(),
                stream_cap: Some(100),
                connection_pool_size: 1,
                timeout: Duration::from_millis(500),
            },
            session: SessionConfig::default(),
            cache: CacheConfig { enabled: true, max_size: 16, ttl: Duration::from_secs(60) },
            resilience: ResilienceConfig {
                circuit_breaker_enabled: true,
                fallback_to_memory: true,
                retry_attempts: 2,
                retry_backoff_ms: vec![1, 1],
                breaker_failure_threshold: 3,
                breaker_reset_timeout: Duration::from_millis(50),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.store.backend, StoreBackend::InMemory);
        assert!(config.cache.enabled);
        assert_eq!(config.resilience.retry_attempts, 3);
    }

    #[test]
    fn test_for_testing_has_fast_backoff() {
        let config = Config::for_testing();
        assert_eq!(config.resilience.retry_backoff_ms, vec![1, 1]);
        assert_eq!(config.store.key_prefix, "test");
    }
}
