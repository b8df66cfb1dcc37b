//! Orders resting at one price, in arrival order.
//!
//! A `LevelQueue` is an intrusive doubly linked list threaded through the
//! book's slot table: each [`OrderSlot`] carries `prev`/`next` handles and the
//! queue only keeps `head`, `tail` and a count. Appending and unlinking are
//! O(1) whatever the number of orders at the price.
//!
//! # Invariant
//!
//! Every handle reachable from a queue refers to a live slot whose order
//! `price` equals the queue's price, and each slot is linked into at most one
//! queue. The owning book checks this in debug builds through
//! `verify_against()`.
//!
//! Quantities are summed on demand from the slot table, never cached.

use slab::Slab;

use crate::types::Order;

/// Handle of an order in the book's slot table.
pub type OrderHandle = usize;

/// Slot table entry: the order plus its links within its price bucket.
#[derive(Debug, Clone)]
pub struct OrderSlot {
    pub order: Order,
    prev: Option<OrderHandle>,
    next: Option<OrderHandle>,
}

impl OrderSlot {
    /// Wrap an order that is not linked into any queue yet.
    #[inline]
    pub fn new(order: Order) -> Self {
        Self {
            order,
            prev: None,
            next: None,
        }
    }
}

/// Head and tail of the orders resting at one price level.
#[derive(Debug, Clone, Default)]
pub struct LevelQueue {
    head: Option<OrderHandle>,
    tail: Option<OrderHandle>,
    len: usize,
}

impl LevelQueue {
    /// Create a new empty queue.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unlinked slot at the back of the queue.
    ///
    /// Returns false if `handle` is not a live slot.
    pub fn push(&mut self, handle: OrderHandle, slots: &mut Slab<OrderSlot>) -> bool {
        let prev_tail = self.tail;
        match slots.get_mut(handle) {
            Some(slot) => {
                slot.prev = prev_tail;
                slot.next = None;
            }
            None => return false,
        }
        if let Some(tail) = prev_tail.and_then(|t| slots.get_mut(t)) {
            tail.next = Some(handle);
        }
        if prev_tail.is_none() {
            self.head = Some(handle);
        }
        self.tail = Some(handle);
        self.len += 1;
        true
    }

    /// Unlink a slot queued here, keeping the relative order of the others.
    ///
    /// Returns false if the slot is dead or not linked into this queue.
    pub fn remove(&mut self, handle: OrderHandle, slots: &mut Slab<OrderSlot>) -> bool {
        let (prev, next) = match slots.get(handle) {
            Some(slot) => (slot.prev, slot.next),
            None => return false,
        };
        // An unlinked slot has no neighbours and is neither head nor tail.
        if (prev.is_none() && self.head != Some(handle))
            || (next.is_none() && self.tail != Some(handle))
        {
            return false;
        }

        match prev.and_then(|p| slots.get_mut(p)) {
            Some(slot) => slot.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| slots.get_mut(n)) {
            Some(slot) => slot.prev = prev,
            None => self.tail = prev,
        }
        if let Some(slot) = slots.get_mut(handle) {
            slot.prev = None;
            slot.next = None;
        }
        self.len -= 1;
        true
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of orders at this price level.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.len
    }

    /// Handles front to back.
    #[inline]
    pub fn iter<'a>(&self, slots: &'a Slab<OrderSlot>) -> LevelIter<'a> {
        LevelIter {
            slots,
            cursor: self.head,
        }
    }

    /// Aggregate resting quantity at this price.
    #[inline]
    pub fn total_quantity(&self, slots: &Slab<OrderSlot>) -> f64 {
        self.iter(slots)
            .filter_map(|h| slots.get(h))
            .map(|slot| slot.order.quantity)
            .sum()
    }

    /// Forget every queued handle. The slots themselves are left as they are.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Verify the links are symmetric and every slot is priced at `price`.
    #[cfg(debug_assertions)]
    pub fn verify_against(&self, price: f64, slots: &Slab<OrderSlot>) {
        let mut prev = None;
        let mut walked = 0usize;
        for handle in self.iter(slots) {
            let slot = slots.get(handle);
            debug_assert!(slot.is_some(), "LevelQueue holds dead handle {handle}");
            if let Some(slot) = slot {
                debug_assert_eq!(slot.prev, prev, "broken back link at {handle}");
                debug_assert_eq!(
                    slot.order.price, price,
                    "order {} queued at {} but priced {}",
                    slot.order.order_id, price, slot.order.price
                );
            }
            prev = Some(handle);
            walked += 1;
        }
        debug_assert_eq!(prev, self.tail, "tail does not end the chain");
        debug_assert_eq!(walked, self.len, "queue length out of sync");
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    pub fn verify_against(&self, _price: f64, _slots: &Slab<OrderSlot>) {}
}

/// Front-to-back walk over a [`LevelQueue`].
pub struct LevelIter<'a> {
    slots: &'a Slab<OrderSlot>,
    cursor: Option<OrderHandle>,
}

impl Iterator for LevelIter<'_> {
    type Item = OrderHandle;

    fn next(&mut self) -> Option<OrderHandle> {
        let handle = self.cursor?;
        self.cursor = self.slots.get(handle).and_then(|slot| slot.next);
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn slot(id: &str, price: f64, quantity: f64) -> OrderSlot {
        OrderSlot::new(Order {
            order_id: id.to_string(),
            side: Side::Bid,
            price,
            quantity,
            timestamp: String::new(),
        })
    }

    #[test]
    fn test_new_queue_is_empty() {
        let queue = LevelQueue::new();
        let slots = Slab::new();
        assert!(queue.is_empty());
        assert_eq!(queue.order_count(), 0);
        assert_eq!(queue.total_quantity(&slots), 0.0);
        assert_eq!(queue.iter(&slots).next(), None);
    }

    #[test]
    fn test_push_and_total() {
        let mut slots = Slab::new();
        let a = slots.insert(slot("a", 100.0, 1.5));
        let b = slots.insert(slot("b", 100.0, 2.5));

        let mut queue = LevelQueue::new();
        assert!(queue.push(a, &mut slots));
        assert!(queue.push(b, &mut slots));
        assert!(!queue.push(99, &mut slots));

        assert_eq!(queue.order_count(), 2);
        assert_eq!(queue.total_quantity(&slots), 4.0);
        assert_eq!(queue.iter(&slots).collect::<Vec<_>>(), vec![a, b]);
        queue.verify_against(100.0, &slots);
    }

    #[test]
    fn test_remove_preserves_arrival_order() {
        let mut slots = Slab::new();
        let handles: Vec<_> = (0..4)
            .map(|i| slots.insert(slot(&i.to_string(), 50.0, 1.0)))
            .collect();

        let mut queue = LevelQueue::new();
        for &h in &handles {
            queue.push(h, &mut slots);
        }

        assert!(queue.remove(handles[1], &mut slots));
        assert!(!queue.remove(handles[1], &mut slots));

        let remaining: Vec<_> = queue.iter(&slots).collect();
        assert_eq!(remaining, vec![handles[0], handles[2], handles[3]]);
        queue.verify_against(50.0, &slots);
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut slots = Slab::new();
        let handles: Vec<_> = (0..3)
            .map(|i| slots.insert(slot(&i.to_string(), 50.0, 1.0)))
            .collect();

        let mut queue = LevelQueue::new();
        for &h in &handles {
            queue.push(h, &mut slots);
        }

        assert!(queue.remove(handles[0], &mut slots));
        assert!(queue.remove(handles[2], &mut slots));
        assert_eq!(queue.iter(&slots).collect::<Vec<_>>(), vec![handles[1]]);
        queue.verify_against(50.0, &slots);

        assert!(queue.remove(handles[1], &mut slots));
        assert!(queue.is_empty());
        assert_eq!(queue.iter(&slots).next(), None);

        // a removed slot can be queued again
        assert!(queue.push(handles[0], &mut slots));
        assert_eq!(queue.iter(&slots).collect::<Vec<_>>(), vec![handles[0]]);
    }

    #[test]
    fn test_clear() {
        let mut slots = Slab::new();
        let a = slots.insert(slot("a", 1.0, 1.0));
        let mut queue = LevelQueue::new();
        queue.push(a, &mut slots);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.iter(&slots).next(), None);
    }
}
