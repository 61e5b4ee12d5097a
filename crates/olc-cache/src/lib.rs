//! olc-cache
//!
//! Bounded, fixed-capacity FIFO cache of orders in front of a persistent
//! order store. Populated eagerly by ingress (`put`) and lazily on lookup
//! misses (`get_or_compute`), rebuilt from the store's persisted membership
//! on startup, and cleared from the store on shutdown.
//!
//! The store itself is abstract ([`OrderStore`]); `olc-db` provides the
//! Postgres implementation.

mod cache;
mod membership;
mod ring;
pub mod store;

pub use cache::{BoundedCache, CacheState, CacheStats};
pub use store::{CacheSnapshot, OrderSink, OrderStore, StoreError};


