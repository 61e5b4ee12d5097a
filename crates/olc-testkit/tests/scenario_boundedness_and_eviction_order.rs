use std::sync::Arc;

use olc_cache::BoundedCache;
use olc_schemas::OrderId;
use olc_testkit::{sample_order, MemoryOrderStore};

#[tokio::test]
async fn membership_never_exceeds_capacity() {
    let store = Arc::new(MemoryOrderStore::new());
    let cache = BoundedCache::restore(store, 5).await;

    for n in 1..=50 {
        cache.put(OrderId(n), sample_order(n));
        assert!(cache.len() <= 5, "len {} after put {n}", cache.len());
        assert!(cache.check_invariants().is_ok());
    }
    assert_eq!(cache.len(), 5);
    assert_eq!(cache.stats().evictions, 45);
}

#[tokio::test]
async fn earliest_k_are_evicted_after_capacity_plus_k_puts() {
    let capacity = 4usize;
    for k in 1..=6i64 {
        let store = Arc::new(MemoryOrderStore::new());
        let cache = BoundedCache::restore(store, capacity).await;

        let total = capacity as i64 + k;
        for n in 1..=total {
            cache.put(OrderId(n), sample_order(n));
        }

        for n in 1..=k {
            assert!(!cache.contains(OrderId(n)), "k={k}: {n} should be evicted");
        }
        for n in (k + 1)..=total {
            assert!(cache.contains(OrderId(n)), "k={k}: {n} should be resident");
        }
    }
}

#[tokio::test]
async fn reinserted_id_is_not_duplicated() {
    let store = Arc::new(MemoryOrderStore::new());
    let cache = BoundedCache::restore(store, 3).await;

    cache.put(OrderId(1), sample_order(1));
    cache.put(OrderId(1), sample_order(1));
    cache.put(OrderId(2), sample_order(2));
    assert_eq!(cache.len(), 2);

    // Slots are [1, 1, 2]: 1 survives until both of its slots are overwritten.
    cache.put(OrderId(3), sample_order(3));
    assert!(cache.contains(OrderId(1)));
    cache.put(OrderId(4), sample_order(4));
    assert!(!cache.contains(OrderId(1)));
    assert!(cache.contains(OrderId(2)));
    assert!(cache.check_invariants().is_ok());
}
