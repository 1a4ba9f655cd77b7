//! Property-based invariants (`spec.md` §8, `SPEC_FULL.md` A5): the local
//! cache never exceeds its configured capacity, and in-memory event ids are
//! strictly increasing within a stream regardless of insertion pattern.

use std::time::Duration;

use mcp_relay::cache::LocalCache;
use mcp_relay::event::{EventStore, InMemoryEventStore};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #[test]
    fn cache_never_exceeds_configured_capacity(
        capacity in 1u64..8,
        keys in prop::collection::vec(0u32..20, 1..50),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let cache: LocalCache<u32> = LocalCache::new(capacity, Duration::from_secs(60));
            for k in &keys {
                cache.set(k.to_string(), *k).await;
                prop_assert!(cache.len().await as u64 <= capacity);
            }
            Ok(())
        })?;
    }

    #[test]
    fn cache_last_write_for_a_key_always_wins(
        value_a in any::<u32>(),
        value_b in any::<u32>(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let cache: LocalCache<u32> = LocalCache::new(10, Duration::from_secs(60));
            cache.set("k", value_a).await;
            cache.set("k", value_b).await;
            prop_assert_eq!(cache.get("k").await, Some(value_b));
            Ok(())
        })?;
    }
}

proptest! {
    #[test]
    fn event_ids_within_a_stream_are_strictly_increasing_regardless_of_interleaving(
        // Each element names which of two streams the next event goes to.
        routing in prop::collection::vec(prop::bool::ANY, 1..60),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = InMemoryEventStore::new(None);
            let mut last_a: Option<u64> = None;
            let mut last_b: Option<u64> = None;

            for (n, to_a) in routing.iter().enumerate() {
                let stream = if *to_a { "a" } else { "b" };
                let eid = store.store_event(stream, json!({"n": n})).await.unwrap();
                let parsed: u64 = eid.parse().unwrap();
                let last = if *to_a { &mut last_a } else { &mut last_b };
                if let Some(prev) = *last {
                    prop_assert!(parsed > prev);
                }
                *last = Some(parsed);
            }
            Ok(())
        })?;
    }
}
