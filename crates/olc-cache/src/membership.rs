//! Background writer for cache-membership notifications.
//!
//! `BoundedCache::put` must never wait on the store, so membership records
//! are queued here and written by a single task in insertion order. A
//! `Flush` command acts as a barrier: it is acknowledged only after every
//! notification queued before it has been attempted.
//!
//! Restore only reads the newest `capacity` records, so after every
//! `capacity` successful writes the writer asks the store to drop older ones.
//! The persisted log therefore stays under `2 * capacity` records.

use std::sync::Arc;

use olc_schemas::OrderId;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::store::OrderStore;

/// Queue depth before `put` starts dropping notifications.
pub(crate) const MEMBERSHIP_QUEUE_DEPTH: usize = 4096;

#[derive(Debug)]
pub(crate) enum MembershipCmd {
    Persist(OrderId),
    Flush(oneshot::Sender<()>),
}

pub(crate) fn spawn_membership_writer<S>(
    store: Arc<S>,
    capacity: usize,
) -> mpsc::Sender<MembershipCmd>
where
    S: OrderStore + ?Sized + 'static,
{
    let (tx, mut rx) = mpsc::channel::<MembershipCmd>(MEMBERSHIP_QUEUE_DEPTH);

    tokio::spawn(async move {
        let mut since_trim = 0usize;
        while let Some(cmd) = rx.recv().await {
            match cmd {
                MembershipCmd::Persist(id) => {
                    if let Err(e) = store.persist_cache_membership(id).await {
                        warn!(order_id = %id, error = %e, "cache membership persist failed");
                        continue;
                    }
                    since_trim += 1;
                    if capacity > 0 && since_trim >= capacity {
                        since_trim = 0;
                        match store.trim_cache_membership(capacity).await {
                            Ok(()) => debug!(keep = capacity, "cache membership trimmed"),
                            Err(e) => warn!(error = %e, "cache membership trim failed"),
                        }
                    }
                }
                MembershipCmd::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        debug!("membership writer stopped");
    });

    tx
}
