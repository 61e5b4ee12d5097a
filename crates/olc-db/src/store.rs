//! Postgres implementation of the cache's store contract.

use std::collections::HashMap;

use olc_cache::{CacheSnapshot, OrderSink, OrderStore, StoreError};
use olc_schemas::{Order, OrderId};
use sqlx::PgPool;
use tracing::debug;

/// `OrderStore` + `OrderSink` over a shared `PgPool`.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: anyhow::Error) -> StoreError {
    StoreError::Unavailable(format!("{e:#}"))
}

#[async_trait::async_trait]
impl OrderStore for PgOrderStore {
    async fn fetch_order(&self, id: OrderId) -> Result<Order, StoreError> {
        crate::fetch_order(&self.pool, id)
            .await
            .map_err(unavailable)?
            .ok_or(StoreError::NotFound(id))
    }

    async fn persist_cache_membership(&self, id: OrderId) -> Result<(), StoreError> {
        crate::insert_cache_membership(&self.pool, id)
            .await
            .map_err(unavailable)
    }

    async fn load_cache_snapshot(
        &self,
        capacity: usize,
    ) -> Result<Option<CacheSnapshot>, StoreError> {
        let window = crate::load_cache_window(&self.pool, capacity)
            .await
            .map_err(unavailable)?;
        if window.is_empty() {
            return Ok(None);
        }
        debug!(rows = window.len(), capacity, "loaded cache membership window");
        Ok(Some(snapshot_from_window(window)))
    }

    async fn trim_cache_membership(&self, keep: usize) -> Result<(), StoreError> {
        let n = crate::trim_cache_membership(&self.pool, keep)
            .await
            .map_err(unavailable)?;
        debug!(rows = n, keep, "trimmed cache membership");
        Ok(())
    }

    async fn clear_cache_state(&self) -> Result<(), StoreError> {
        let n = crate::clear_cache_membership(&self.pool)
            .await
            .map_err(unavailable)?;
        debug!(rows = n, "cleared cache membership");
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderSink for PgOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<OrderId, StoreError> {
        crate::insert_order(&self.pool, order)
            .await
            .map_err(unavailable)
    }
}

/// Lay an oldest-first membership window into eviction slots `0..n`.
///
/// The next write position is `n`; when the window filled every slot that
/// equals capacity, which the cache normalizes to 0 on restore.
pub fn snapshot_from_window(window: Vec<(OrderId, Order)>) -> CacheSnapshot {
    let mut orders = HashMap::with_capacity(window.len());
    let mut sequence = Vec::with_capacity(window.len());
    for (id, order) in window {
        sequence.push(Some(id));
        orders.insert(id, order);
    }
    CacheSnapshot {
        next_pos: sequence.len(),
        orders,
        sequence,
    }
}
