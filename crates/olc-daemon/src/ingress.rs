//! New-order ingress: decode, persist, then publish to the cache.
//!
//! The event-source transport is outside this crate. Whatever delivers
//! payloads (a message-bus bridge or `POST /v1/orders`) calls
//! [`OrderIngress::handle_payload`] and acts on [`IngressOutcome::disposition`].

use std::sync::Arc;

use olc_cache::OrderSink;
use olc_schemas::{Order, OrderId};
use tracing::{info, warn};

use crate::state::SharedCache;

/// What the delivering transport should do with the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: the message is done (stored, or undecodable and dropped).
    Ack,
    /// Do not acknowledge: the transport redelivers later.
    Redeliver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressOutcome {
    /// Stored under this id and published to the cache.
    Accepted(OrderId),
    /// Payload is not a valid order. Redelivery would fail the same way.
    Rejected(String),
    /// Store write failed; the order was not published.
    Deferred(String),
}

impl IngressOutcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            IngressOutcome::Accepted(_) | IngressOutcome::Rejected(_) => Disposition::Ack,
            IngressOutcome::Deferred(_) => Disposition::Redeliver,
        }
    }
}

#[derive(Clone)]
pub struct OrderIngress {
    sink: Arc<dyn OrderSink>,
    cache: SharedCache,
}

impl OrderIngress {
    pub fn new(sink: Arc<dyn OrderSink>, cache: SharedCache) -> Self {
        Self { sink, cache }
    }

    /// Handle one raw "new order" message.
    ///
    /// The order is cached only after the store has assigned its id, so a
    /// cached order always exists in the store.
    pub async fn handle_payload(&self, data: &[u8]) -> IngressOutcome {
        let order: Order = match serde_json::from_slice(data) {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, bytes = data.len(), "dropping undecodable order payload");
                return IngressOutcome::Rejected(e.to_string());
            }
        };

        let id = match self.sink.insert_order(&order).await {
            Ok(id) => id,
            Err(e) => {
                warn!(order_uid = %order.order_uid, error = %e, "order insert failed; will be redelivered");
                return IngressOutcome::Deferred(e.to_string());
            }
        };

        info!(order_id = %id, order_uid = %order.order_uid, "order stored");
        self.cache.put(id, order);
        IngressOutcome::Accepted(id)
    }
}
