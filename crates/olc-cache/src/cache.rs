//! The bounded read-through / write-through order cache.
//!
//! # Concurrency
//!
//! The eviction ring sits behind one `std::sync::RwLock`. Cache hits take it
//! shared; `put` takes it exclusive for the structural update only. The lock
//! is never held across an `.await`: store fetches on a miss and membership
//! notifications both happen outside it.
//!
//! # Lifecycle
//!
//! `Uninitialized -> Restoring -> Ready -> ShuttingDown -> Stopped`.
//! [`BoundedCache::restore`] only returns once restoration has finished, so
//! callers can never observe `Restoring`. After [`BoundedCache::shutdown`]
//! starts, `put` is a no-op; lookups keep working without populating.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use olc_schemas::{Order, OrderId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::membership::{spawn_membership_writer, MembershipCmd};
use crate::ring::EvictionRing;
use crate::store::{OrderStore, StoreError};

// ---------------------------------------------------------------------------
// CacheState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CacheState {
    Uninitialized = 0,
    Restoring = 1,
    Ready = 2,
    ShuttingDown = 3,
    Stopped = 4,
}

impl CacheState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::Uninitialized => "uninitialized",
            CacheState::Restoring => "restoring",
            CacheState::Ready => "ready",
            CacheState::ShuttingDown => "shutting_down",
            CacheState::Stopped => "stopped",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => CacheState::Restoring,
            2 => CacheState::Ready,
            3 => CacheState::ShuttingDown,
            4 => CacheState::Stopped,
            _ => CacheState::Uninitialized,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheStats
// ---------------------------------------------------------------------------

/// Point-in-time counters, for the status surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

// ---------------------------------------------------------------------------
// BoundedCache
// ---------------------------------------------------------------------------

/// Fixed-capacity FIFO cache of orders in front of an [`OrderStore`].
///
/// Construct once with [`BoundedCache::restore`] and share via `Arc`.
pub struct BoundedCache<S: OrderStore + ?Sized + 'static> {
    store: Arc<S>,
    ring: RwLock<EvictionRing>,
    state: AtomicU8,
    counters: Counters,
    membership: mpsc::Sender<MembershipCmd>,
}

impl<S: OrderStore + ?Sized + 'static> BoundedCache<S> {
    /// Build the cache and rebuild its contents from the store's snapshot.
    ///
    /// A missing or unreadable snapshot is not an error: the cache starts
    /// empty and a warning is logged. Must be called inside a tokio runtime.
    pub async fn restore(store: Arc<S>, capacity: usize) -> Self {
        let cache = Self {
            membership: spawn_membership_writer(Arc::clone(&store), capacity),
            store,
            ring: RwLock::new(EvictionRing::new(capacity)),
            state: AtomicU8::new(CacheState::Uninitialized as u8),
            counters: Counters::default(),
        };
        cache.set_state(CacheState::Restoring);

        if capacity == 0 {
            info!("cache is off: capacity = 0, every lookup goes to the store");
        } else {
            cache.load_snapshot(capacity).await;
        }

        cache.set_state(CacheState::Ready);
        cache
    }

    async fn load_snapshot(&self, capacity: usize) {
        info!(capacity, "checking store for a persisted cache snapshot");
        let snap = match self.store.load_cache_snapshot(capacity).await {
            Ok(Some(s)) if !s.is_empty() => s,
            Ok(_) => {
                info!("no persisted cache snapshot; starting empty");
                return;
            }
            Err(e) => {
                warn!(error = %e, "cache snapshot unavailable; starting empty");
                return;
            }
        };

        let (ring, report) = EvictionRing::from_snapshot(capacity, snap);
        if report.orphan_slots + report.unreferenced_orders + report.overflow_slots > 0
            || report.pos_normalized
        {
            warn!(?report, "cache snapshot was inconsistent; repaired on restore");
        }
        info!(len = ring.len(), next_pos = ring.pos(), "cache restored from store");
        *self.write_ring() = ring;
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    /// Insert (or refresh) `id` and queue its membership record.
    ///
    /// Never waits on the store. A failed membership write is logged by the
    /// writer task and does not undo the in-memory insert.
    pub fn put(&self, id: OrderId, order: impl Into<Arc<Order>>) {
        if self.capacity() == 0 {
            debug!(order_id = %id, "cache is off; put ignored");
            return;
        }

        // The membership record is queued while the write lock is held so the
        // queue order matches the eviction order exactly. `try_send` does no I/O.
        let (evicted, next_pos, queued) = {
            let mut ring = self.write_ring();
            let state = self.state();
            if state != CacheState::Ready {
                debug!(order_id = %id, state = state.as_str(), "cache not ready; put ignored");
                return;
            }
            let evicted = ring.insert(id, order.into());
            let queued = self.membership.try_send(MembershipCmd::Persist(id));
            (evicted, ring.pos(), queued)
        };

        if let Some(old) = evicted {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(order_id = %old, "evicted from cache");
        }
        debug!(order_id = %id, next_pos, "order added to cache");

        match queued {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(order_id = %id, "membership queue full; notification dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(order_id = %id, "membership writer gone; notification dropped");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    /// Return the cached order, or run `on_miss` and populate the cache.
    ///
    /// A failing `on_miss` propagates unchanged and leaves the cache as it was.
    pub async fn get_or_compute<F, Fut>(
        &self,
        id: OrderId,
        on_miss: F,
    ) -> Result<Arc<Order>, StoreError>
    where
        F: FnOnce(OrderId) -> Fut,
        Fut: Future<Output = Result<Order, StoreError>>,
    {
        if let Some(hit) = self.peek(id) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(order_id = %id, "cache hit");
            return Ok(hit);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(order_id = %id, "cache miss; falling back to store");

        let order = Arc::new(on_miss(id).await?);
        self.put(id, Arc::clone(&order));
        Ok(order)
    }

    /// [`get_or_compute`](Self::get_or_compute) with this cache's own store
    /// as the fallback, bounded by `timeout`.
    ///
    /// A timeout surfaces as [`StoreError::Unavailable`] for this lookup only.
    pub async fn get_or_fetch(
        &self,
        id: OrderId,
        timeout: Duration,
    ) -> Result<Arc<Order>, StoreError> {
        let store = Arc::clone(&self.store);
        self.get_or_compute(id, |id| async move {
            match tokio::time::timeout(timeout, store.fetch_order(id)).await {
                Ok(res) => res,
                Err(_) => Err(StoreError::Unavailable(format!(
                    "fetch of order {id} timed out after {}ms",
                    timeout.as_millis()
                ))),
            }
        })
        .await
    }

    /// Cache-only lookup; never touches the store.
    pub fn peek(&self, id: OrderId) -> Option<Arc<Order>> {
        self.read_ring().get(id)
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.read_ring().contains(id)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Drop the persisted snapshot. In-memory contents are left as they are.
    ///
    /// Pending membership notifications are drained first so none lands
    /// after the clear. Calling this twice is a logged no-op.
    pub async fn shutdown(&self) {
        // Taken under the write lock so no `put` can queue a record after the flush.
        let began = {
            let _ring = self.write_ring();
            self.state.compare_exchange(
                CacheState::Ready as u8,
                CacheState::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
        };
        if let Err(prev) = began {
            info!(state = CacheState::from_u8(prev).as_str(), "cache shutdown already handled");
            return;
        }
        info!("cache shutting down");

        self.flush_membership().await;

        if let Err(e) = self.store.clear_cache_state().await {
            warn!(error = %e, "failed to clear persisted cache state");
        }

        self.set_state(CacheState::Stopped);
        info!("cache stopped");
    }

    /// Wait until every membership notification queued so far has been
    /// handed to the store.
    pub async fn flush_membership(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.membership.send(MembershipCmd::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn state(&self) -> CacheState {
        CacheState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn capacity(&self) -> usize {
        self.read_ring().capacity()
    }

    /// Number of distinct orders resident.
    pub fn len(&self) -> usize {
        self.read_ring().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the next eviction slot to be written.
    pub fn next_pos(&self) -> usize {
        self.read_ring().pos()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Verify that membership and eviction sequence agree.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.read_ring().check_invariants()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_state(&self, st: CacheState) {
        self.state.store(st as u8, Ordering::Release);
    }

    // Ring mutations have no panicking path mid-update; poisoned guards are reused.
    fn read_ring(&self) -> RwLockReadGuard<'_, EvictionRing> {
        self.ring.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_ring(&self) -> RwLockWriteGuard<'_, EvictionRing> {
        self.ring.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
