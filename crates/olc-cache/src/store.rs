//! Store boundary consumed by the bounded cache.
//!
//! This module defines **only** the narrow contract the cache needs from the
//! persistent order store. No SQL, no connection handling, no order insert
//! path belong here; `olc-db` implements the trait for Postgres and
//! `olc-testkit` implements it in memory.

use std::collections::HashMap;
use std::fmt;

use olc_schemas::{Order, OrderId};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors an [`OrderStore`] may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested order exists neither in the cache nor in the store.
    NotFound(OrderId),
    /// The store could not be reached or the query failed (including timeouts).
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "order {id} not found"),
            StoreError::Unavailable(msg) => write!(f, "order store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Persisted cache state used to rebuild the cache after a restart.
///
/// `sequence[i]` is the id held in eviction slot `i`; `None` marks a slot
/// that has never been written. `next_pos` is the next slot to overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub orders: HashMap<OrderId, Order>,
    pub sequence: Vec<Option<OrderId>>,
    pub next_pos: usize,
}

impl CacheSnapshot {
    pub fn is_empty(&self) -> bool {
        self.sequence.iter().all(Option::is_none)
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Persistent order store contract.
///
/// Implementations must be object-safe (`Arc<dyn OrderStore>` is the common
/// handle) and `Send + Sync` so the cache can call them from any task.
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    /// Fetch one order by id. `NotFound` when the id is unknown.
    async fn fetch_order(&self, id: OrderId) -> Result<Order, StoreError>;

    /// Record that `id` is now cache-resident. Called in insertion order.
    async fn persist_cache_membership(&self, id: OrderId) -> Result<(), StoreError>;

    /// Load the most recent cache state, bounded to `capacity` slots.
    ///
    /// `Ok(None)` means no snapshot exists. Callers treat `Err` the same way.
    async fn load_cache_snapshot(&self, capacity: usize)
        -> Result<Option<CacheSnapshot>, StoreError>;

    /// Drop persisted membership older than the newest `keep` records.
    async fn trim_cache_membership(&self, keep: usize) -> Result<(), StoreError>;

    /// Drop any persisted cache state.
    async fn clear_cache_state(&self) -> Result<(), StoreError>;
}

/// Write side of the store, used by ingress. The cache never calls it.
#[async_trait::async_trait]
pub trait OrderSink: Send + Sync {
    /// Durably persist a new order and return the id assigned to it.
    ///
    /// Redelivery of an already-stored order returns the existing id.
    async fn insert_order(&self, order: &Order) -> Result<OrderId, StoreError>;
}
