//! Fixed-capacity FIFO eviction ring plus the membership map it guards.
//!
//! # Invariants
//!
//! - `slots.len() == capacity` for the lifetime of the ring; the slice is
//!   never resized.
//! - `pos < capacity` whenever `capacity > 0`.
//! - The key set of `members` is exactly the set of ids present in `slots`.
//!   Each member carries the number of slots that reference it, so the
//!   "still present elsewhere?" check on overwrite is O(1).
//!
//! All logic here is synchronous and lock-free; `BoundedCache` wraps the ring
//! in a reader/writer lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use olc_schemas::{Order, OrderId};

use crate::store::CacheSnapshot;

#[derive(Debug)]
struct Member {
    order: Arc<Order>,
    refs: usize,
}

/// What restore had to discard from an inconsistent snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RestoreReport {
    /// Slots whose id had no order in the snapshot (left empty).
    pub orphan_slots: usize,
    /// Orders in the snapshot not referenced by any slot (dropped).
    pub unreferenced_orders: usize,
    /// Sequence entries beyond capacity (ignored).
    pub overflow_slots: usize,
    /// `true` when the persisted write position had to be reset to 0.
    pub pos_normalized: bool,
}

#[derive(Debug)]
pub(crate) struct EvictionRing {
    slots: Box<[Option<OrderId>]>,
    pos: usize,
    members: HashMap<OrderId, Member>,
}

impl EvictionRing {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            pos: 0,
            members: HashMap::with_capacity(capacity),
        }
    }

    /// Rebuild a ring from persisted state, repairing anything that would
    /// break the invariants above.
    pub(crate) fn from_snapshot(capacity: usize, snap: CacheSnapshot) -> (Self, RestoreReport) {
        let mut ring = Self::new(capacity);
        let mut report = RestoreReport::default();
        let CacheSnapshot {
            mut orders,
            sequence,
            next_pos,
        } = snap;

        if sequence.len() > capacity {
            report.overflow_slots = sequence.len() - capacity;
        }

        // Shared Arc per id so duplicated slots point at one allocation.
        let mut resident: HashMap<OrderId, Arc<Order>> = HashMap::new();
        for (slot, id) in sequence.into_iter().take(capacity).enumerate() {
            let Some(id) = id else {
                continue;
            };
            let order = match resident.get(&id) {
                Some(o) => Arc::clone(o),
                None => match orders.remove(&id) {
                    Some(o) => {
                        let o = Arc::new(o);
                        resident.insert(id, Arc::clone(&o));
                        o
                    }
                    None => {
                        report.orphan_slots += 1;
                        continue;
                    }
                },
            };
            ring.slots[slot] = Some(id);
            ring.members
                .entry(id)
                .and_modify(|m| m.refs += 1)
                .or_insert(Member { order, refs: 1 });
        }
        report.unreferenced_orders = orders.len();

        ring.pos = if capacity == 0 || next_pos >= capacity {
            // next_pos == capacity is the expected off-by-one from a full ring.
            report.pos_normalized = capacity > 0 && next_pos > capacity;
            0
        } else {
            next_pos
        };

        (ring, report)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn get(&self, id: OrderId) -> Option<Arc<Order>> {
        self.members.get(&id).map(|m| Arc::clone(&m.order))
    }

    pub(crate) fn contains(&self, id: OrderId) -> bool {
        self.members.contains_key(&id)
    }

    /// Write `id` into the current slot and advance the cursor.
    ///
    /// Returns the id that left the membership map, if any. A no-op on a
    /// zero-capacity ring.
    pub(crate) fn insert(&mut self, id: OrderId, order: Arc<Order>) -> Option<OrderId> {
        let cap = self.slots.len();
        if cap == 0 {
            return None;
        }

        let prev = self.slots[self.pos].replace(id);
        self.pos = (self.pos + 1) % cap;

        let mut evicted = None;
        if let Some(old) = prev {
            if let Entry::Occupied(mut e) = self.members.entry(old) {
                e.get_mut().refs -= 1;
                if e.get().refs == 0 && old != id {
                    e.remove();
                    evicted = Some(old);
                }
            }
        }

        match self.members.entry(id) {
            Entry::Occupied(mut e) => {
                let m = e.get_mut();
                m.order = order;
                m.refs += 1;
            }
            Entry::Vacant(e) => {
                e.insert(Member { order, refs: 1 });
            }
        }

        evicted
    }

    #[cfg(test)]
    fn to_snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            orders: self
                .members
                .iter()
                .map(|(id, m)| (*id, Order::clone(&m.order)))
                .collect(),
            sequence: self.slots.to_vec(),
            next_pos: self.pos,
        }
    }

    /// Structural self-check used by tests and debug assertions.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        let cap = self.slots.len();
        if cap > 0 && self.pos >= cap {
            return Err(format!("pos {} out of range for capacity {}", self.pos, cap));
        }
        let mut counts: HashMap<OrderId, usize> = HashMap::new();
        for id in self.slots.iter().flatten() {
            *counts.entry(*id).or_default() += 1;
        }
        if counts.len() != self.members.len() {
            return Err(format!(
                "membership size {} != distinct ids in sequence {}",
                self.members.len(),
                counts.len()
            ));
        }
        for (id, n) in counts {
            match self.members.get(&id) {
                Some(m) if m.refs == n => {}
                Some(m) => return Err(format!("id {id}: refs {} but {} slots", m.refs, n)),
                None => return Err(format!("id {id} in sequence but not in membership")),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use olc_schemas::{Delivery, Payment};

    fn order(tag: &str) -> Arc<Order> {
        Arc::new(Order {
            order_uid: tag.to_string(),
            track_number: format!("TRACK-{tag}"),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "n".into(),
                phone: "p".into(),
                zip: "z".into(),
                city: "c".into(),
                address: "a".into(),
                region: "r".into(),
                email: "e".into(),
            },
            payment: Payment {
                transaction: tag.to_string(),
                request_id: String::new(),
                currency: "USD".into(),
                provider: "wbpay".into(),
                amount: 1,
                payment_dt: 0,
                bank: "alpha".into(),
                delivery_cost: 0,
                goods_total: 1,
                custom_fee: 0,
            },
            items: vec![],
            locale: "en".into(),
            internal_signature: String::new(),
            customer_id: "c".into(),
            delivery_service: "meest".into(),
            shardkey: "1".into(),
            sm_id: 1,
            date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
            oof_shard: "1".into(),
        })
    }

    fn put(ring: &mut EvictionRing, id: i64) -> Option<OrderId> {
        ring.insert(OrderId(id), order(&id.to_string()))
    }

    #[test]
    fn capacity_three_evicts_oldest() {
        let mut ring = EvictionRing::new(3);
        for id in 1..=3 {
            assert_eq!(put(&mut ring, id), None);
        }
        assert_eq!(ring.pos(), 0);
        assert_eq!(put(&mut ring, 4), Some(OrderId(1)));
        assert!(!ring.contains(OrderId(1)));
        for id in 2..=4 {
            assert!(ring.contains(OrderId(id)));
        }
        assert_eq!(ring.len(), 3);
        ring.check_invariants().unwrap();
    }

    #[test]
    fn membership_never_exceeds_capacity() {
        let mut ring = EvictionRing::new(5);
        for id in 0..100 {
            put(&mut ring, id);
            assert!(ring.len() <= 5);
        }
        for id in 95..100 {
            assert!(ring.contains(OrderId(id)));
        }
        ring.check_invariants().unwrap();
    }

    #[test]
    fn reinsert_refreshes_without_duplicate_membership() {
        let mut ring = EvictionRing::new(3);
        put(&mut ring, 1);
        put(&mut ring, 2);
        put(&mut ring, 1); // slots: [1, 2, 1]
        assert_eq!(ring.len(), 2);

        // Overwrites slot 0 (first copy of 1); 1 is still referenced by slot 2.
        assert_eq!(put(&mut ring, 3), None);
        assert!(ring.contains(OrderId(1)));
        ring.check_invariants().unwrap();

        // Overwrites slot 1 (2) -> evicted.
        assert_eq!(put(&mut ring, 4), Some(OrderId(2)));
        // Overwrites slot 2 (last copy of 1) -> evicted.
        assert_eq!(put(&mut ring, 5), Some(OrderId(1)));
        ring.check_invariants().unwrap();
    }

    #[test]
    fn reinsert_is_last_write_wins() {
        let mut ring = EvictionRing::new(2);
        ring.insert(OrderId(7), order("first"));
        ring.insert(OrderId(7), order("second"));
        assert_eq!(ring.get(OrderId(7)).unwrap().order_uid, "second");
        assert_eq!(ring.len(), 1);
        // Ring is full of 7s; overwriting one copy keeps the other.
        assert_eq!(put(&mut ring, 8), None);
        assert!(ring.contains(OrderId(7)));
        ring.check_invariants().unwrap();
    }

    #[test]
    fn overwriting_slot_with_same_id_keeps_member() {
        let mut ring = EvictionRing::new(1);
        put(&mut ring, 9);
        assert_eq!(put(&mut ring, 9), None);
        assert!(ring.contains(OrderId(9)));
        ring.check_invariants().unwrap();
    }

    #[test]
    fn zero_capacity_is_inert() {
        let mut ring = EvictionRing::new(0);
        assert_eq!(put(&mut ring, 1), None);
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.pos(), 0);
        ring.check_invariants().unwrap();
    }

    #[test]
    fn snapshot_round_trip_preserves_order_of_eviction() {
        let mut ring = EvictionRing::new(3);
        for id in 1..=4 {
            put(&mut ring, id);
        }
        let (restored, report) = EvictionRing::from_snapshot(3, ring.to_snapshot());
        assert_eq!(report, RestoreReport::default());
        assert_eq!(restored.pos(), ring.pos());

        let mut a = ring;
        let mut b = restored;
        assert_eq!(put(&mut a, 5), put(&mut b, 5));
        assert_eq!(put(&mut a, 6), put(&mut b, 6));
        b.check_invariants().unwrap();
    }

    #[test]
    fn restore_normalizes_pos_equal_to_capacity() {
        let mut orders = HashMap::new();
        for id in 1..=3 {
            orders.insert(OrderId(id), Order::clone(&order(&id.to_string())));
        }
        let snap = CacheSnapshot {
            orders,
            sequence: vec![Some(OrderId(1)), Some(OrderId(2)), Some(OrderId(3))],
            next_pos: 3,
        };
        let (ring, report) = EvictionRing::from_snapshot(3, snap);
        assert_eq!(ring.pos(), 0);
        assert!(!report.pos_normalized);
        ring.check_invariants().unwrap();
    }

    #[test]
    fn restore_repairs_inconsistent_snapshot() {
        let mut orders = HashMap::new();
        orders.insert(OrderId(1), Order::clone(&order("1")));
        orders.insert(OrderId(99), Order::clone(&order("99")));
        let snap = CacheSnapshot {
            orders,
            sequence: vec![Some(OrderId(1)), Some(OrderId(2)), None, Some(OrderId(1))],
            next_pos: 17,
        };
        let (ring, report) = EvictionRing::from_snapshot(3, snap);

        assert_eq!(report.orphan_slots, 1);
        assert_eq!(report.unreferenced_orders, 1);
        assert_eq!(report.overflow_slots, 1);
        assert!(report.pos_normalized);
        assert_eq!(ring.pos(), 0);
        assert_eq!(ring.len(), 1);
        assert!(ring.contains(OrderId(1)));
        ring.check_invariants().unwrap();
    }
}
