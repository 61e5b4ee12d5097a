use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use olc_cache::{CacheSnapshot, OrderSink, OrderStore, StoreError};
use olc_schemas::{Order, OrderId};

/// In-memory order store with the same snapshot semantics as the Postgres
/// adapter: membership is an append-only log and a snapshot is the newest
/// `capacity` entries, oldest first.
///
/// Failures and latency can be injected per operation.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    inner: Mutex<Inner>,
    fetches: AtomicUsize,
    persists: AtomicUsize,
    clears: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_persist: AtomicBool,
    fail_snapshot: AtomicBool,
    fail_insert: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
}

#[derive(Debug, Default)]
struct Inner {
    orders: BTreeMap<OrderId, Order>,
    by_uid: HashMap<String, OrderId>,
    last_id: i64,
    membership: Vec<OrderId>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `n` sample orders with ids `1..=n`.
    pub fn with_sample_orders(n: i64) -> Self {
        let store = Self::new();
        for i in 1..=n {
            store.insert(crate::sample_order(i));
        }
        store
    }

    /// Store an order, assigning the next id. Idempotent on `order_uid`.
    pub fn insert(&self, order: Order) -> OrderId {
        let mut g = self.lock();
        if let Some(id) = g.by_uid.get(&order.order_uid) {
            return *id;
        }
        g.last_id += 1;
        let id = OrderId(g.last_id);
        g.by_uid.insert(order.order_uid.clone(), id);
        g.orders.insert(id, order);
        id
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    /// Number of `fetch_order` calls so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of membership records accepted so far, trimmed ones included.
    pub fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    /// Membership records still held (since the last clear and trim), in order.
    pub fn membership_log(&self) -> Vec<OrderId> {
        self.lock().membership.clone()
    }

    pub fn fail_fetch(&self, on: bool) {
        self.fail_fetch.store(on, Ordering::SeqCst);
    }

    pub fn fail_persist(&self, on: bool) {
        self.fail_persist.store(on, Ordering::SeqCst);
    }

    pub fn fail_snapshot(&self, on: bool) {
        self.fail_snapshot.store(on, Ordering::SeqCst);
    }

    pub fn fail_insert(&self, on: bool) {
        self.fail_insert.store(on, Ordering::SeqCst);
    }

    /// Delay every subsequent fetch by `delay` (`None` removes it).
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self.fetch_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl OrderStore for MemoryOrderStore {
    async fn fetch_order(&self, id: OrderId) -> Result<Order, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected fetch failure".to_string()));
        }
        self.lock()
            .orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn persist_cache_membership(&self, id: OrderId) -> Result<(), StoreError> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected persist failure".to_string()));
        }
        self.lock().membership.push(id);
        self.persists.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_cache_snapshot(
        &self,
        capacity: usize,
    ) -> Result<Option<CacheSnapshot>, StoreError> {
        if self.fail_snapshot.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected snapshot failure".to_string()));
        }
        let g = self.lock();
        if g.membership.is_empty() {
            return Ok(None);
        }

        let start = g.membership.len().saturating_sub(capacity);
        let mut snap = CacheSnapshot::default();
        for id in &g.membership[start..] {
            if let Some(order) = g.orders.get(id) {
                snap.sequence.push(Some(*id));
                snap.orders.insert(*id, order.clone());
            }
        }
        snap.next_pos = snap.sequence.len();
        Ok(Some(snap))
    }

    async fn trim_cache_membership(&self, keep: usize) -> Result<(), StoreError> {
        let mut g = self.lock();
        let excess = g.membership.len().saturating_sub(keep);
        g.membership.drain(..excess);
        Ok(())
    }

    async fn clear_cache_state(&self) -> Result<(), StoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.lock().membership.clear();
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderSink for MemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<OrderId, StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected insert failure".to_string()));
        }
        Ok(self.insert(order.clone()))
    }
}
