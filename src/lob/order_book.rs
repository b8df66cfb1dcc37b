//! Individual-order (order-level) book for one symbol.
//!
//! Layout:
//! - `orders`: slot table owning every live [`Order`], addressed by handle
//! - `index`: order id → handle
//! - `bids` / `asks`: price → [`LevelQueue`], a list linked through the slots
//!   in arrival order
//!
//! # Invariants
//!
//! - every handle in a price bucket is in `index` exactly once, and every
//!   handle in `index` sits in exactly one bucket
//! - a bucket is removed as soon as it becomes empty
//! - `order.price` equals the price of the bucket holding it
//!
//! All mutation goes through `link()` / `unlink()` so the two indexes move
//! together.

use ahash::AHashMap;
use slab::Slab;

use super::config::BookConfig;
use super::level_queue::{LevelQueue, OrderHandle, OrderSlot};
use super::multi_symbol::ReconstructedBook;
use super::side_book::SideBook;
use crate::metrics::DepthView;
use crate::types::{
    ApplySummary, BookConsistency, EventOutcome, Order, OrderEvent, OrderLine, OrderRecord,
    OrphanedEvent, PriceLevel, RecordType, Side,
};

/// Lifecycle events applied since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounters {
    pub add: u64,
    pub modify: u64,
    pub delete: u64,
    /// Modify/delete events that referenced an unknown order id
    pub orphan: u64,
}

/// Order-level book for a single symbol.
#[derive(Debug, Clone)]
pub struct OrderLevelBook {
    symbol: String,
    config: BookConfig,

    orders: Slab<OrderSlot>,
    index: AHashMap<String, OrderHandle>,

    bids: SideBook<LevelQueue>,
    asks: SideBook<LevelQueue>,

    counters: EventCounters,
    /// Orphaned events of the last update, until taken
    orphans: Vec<OrphanedEvent>,
    initialized: bool,
}

impl OrderLevelBook {
    /// Create an empty, uninitialized book.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_config(symbol, BookConfig::default())
    }

    /// Create an empty book with custom configuration.
    pub fn with_config(symbol: impl Into<String>, config: BookConfig) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            orders: Slab::new(),
            index: AHashMap::new(),
            bids: SideBook::new(Side::Bid),
            asks: SideBook::new(Side::Ask),
            counters: EventCounters::default(),
            orphans: Vec::new(),
            initialized: false,
        }
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Replace the book with a snapshot of resting orders.
    ///
    /// Event counters are left untouched.
    pub fn apply_snapshot(&mut self, bids: &[OrderLine], asks: &[OrderLine]) -> ApplySummary {
        self.clear_orders();
        self.orphans.clear();

        let mut summary = ApplySummary::default();
        for (side, lines) in [(Side::Bid, bids), (Side::Ask, asks)] {
            for line in lines {
                if !line.is_restable() {
                    summary.invalid += 1;
                    continue;
                }
                if self.insert(side, line) {
                    summary.duplicates += 1;
                }
                summary.applied += 1;
            }
        }

        self.initialized = true;
        summary
    }

    /// Apply add/modify/delete events, bids first then asks.
    ///
    /// The ids of orphaned events are kept until the next update or snapshot,
    /// see [`orphans()`](Self::orphans).
    pub fn apply_update(&mut self, bids: &[OrderLine], asks: &[OrderLine]) -> ApplySummary {
        self.orphans.clear();

        let mut summary = ApplySummary::default();
        for (side, lines) in [(Side::Bid, bids), (Side::Ask, asks)] {
            for line in lines {
                let replaces =
                    line.event == OrderEvent::Add && self.index.contains_key(&line.order_id);
                let outcome = self.apply_event(side, line);
                match outcome {
                    EventOutcome::Applied if replaces => summary.duplicates += 1,
                    EventOutcome::OrphanEvent => self.orphans.push(OrphanedEvent {
                        order_id: line.order_id.clone(),
                        event: line.event,
                    }),
                    _ => {}
                }
                summary.record(outcome);
            }
        }
        summary
    }

    /// Orphaned events of the last update, in arrival order.
    #[inline]
    pub fn orphans(&self) -> &[OrphanedEvent] {
        &self.orphans
    }

    /// Apply a decoded record.
    pub fn apply_record(&mut self, record: &OrderRecord) -> ApplySummary {
        match record.record_type {
            RecordType::Snapshot => self.apply_snapshot(&record.bids, &record.asks),
            RecordType::Update => self.apply_update(&record.bids, &record.asks),
        }
    }

    /// Apply a single lifecycle event.
    ///
    /// `side` is the array the line arrived in. Modify and delete act on the
    /// side the order was added to.
    pub fn apply_event(&mut self, side: Side, line: &OrderLine) -> EventOutcome {
        match line.event {
            OrderEvent::Add => {
                if !line.is_restable() {
                    return EventOutcome::InvalidInput;
                }
                self.insert(side, line);
                self.counters.add += 1;
                EventOutcome::Applied
            }
            OrderEvent::Modify => {
                if !line.is_restable() {
                    return EventOutcome::InvalidInput;
                }
                let Some(&handle) = self.index.get(&line.order_id) else {
                    self.counters.orphan += 1;
                    return EventOutcome::OrphanEvent;
                };
                self.unlink(handle);
                if let Some(order) = self.orders.get_mut(handle).map(|slot| &mut slot.order) {
                    order.price = line.price;
                    order.quantity = line.quantity;
                    if !line.timestamp.is_empty() {
                        order.timestamp.clone_from(&line.timestamp);
                    }
                }
                self.link(handle);
                self.counters.modify += 1;
                EventOutcome::Applied
            }
            OrderEvent::Delete => match self.index.get(&line.order_id) {
                Some(&handle) => {
                    self.remove(handle);
                    self.counters.delete += 1;
                    EventOutcome::Applied
                }
                None => {
                    self.counters.orphan += 1;
                    EventOutcome::OrphanEvent
                }
            },
            OrderEvent::Unspecified => EventOutcome::InvalidInput,
        }
    }

    /// Insert a new resting order. Returns true if it replaced an order with
    /// the same id.
    fn insert(&mut self, side: Side, line: &OrderLine) -> bool {
        let replaced = match self.index.get(&line.order_id) {
            Some(&old) => {
                self.remove(old);
                true
            }
            None => false,
        };

        let handle = self.orders.insert(OrderSlot::new(Order {
            order_id: line.order_id.clone(),
            side,
            price: line.price,
            quantity: line.quantity,
            timestamp: line.timestamp.clone(),
        }));
        self.index.insert(line.order_id.clone(), handle);
        self.link(handle);
        replaced
    }

    /// Drop an order from both indexes and free its slot.
    fn remove(&mut self, handle: OrderHandle) -> Option<Order> {
        self.unlink(handle);
        let order = self.orders.try_remove(handle)?.order;
        self.index.remove(&order.order_id);
        Some(order)
    }

    /// Queue `handle` at the back of its price bucket.
    fn link(&mut self, handle: OrderHandle) {
        let Some(slot) = self.orders.get(handle) else {
            return;
        };
        let (side, price) = (slot.order.side, slot.order.price);
        let levels = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        levels.entry_or_default(price).push(handle, &mut self.orders);
    }

    /// Take `handle` out of its price bucket, dropping the bucket if emptied.
    fn unlink(&mut self, handle: OrderHandle) {
        let Some(slot) = self.orders.get(handle) else {
            return;
        };
        let (side, price) = (slot.order.side, slot.order.price);
        let levels = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        let emptied = match levels.get_mut(price) {
            Some(queue) => {
                queue.remove(handle, &mut self.orders);
                queue.is_empty()
            }
            None => false,
        };
        if emptied {
            levels.remove(price);
        }
    }

    fn clear_orders(&mut self) {
        self.orders.clear();
        self.index.clear();
        self.bids.clear();
        self.asks.clear();
    }

    #[inline]
    fn levels(&self, side: Side) -> &SideBook<LevelQueue> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Look up a resting order by id.
    #[inline]
    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.index
            .get(order_id)
            .and_then(|&h| self.orders.get(h))
            .map(|slot| &slot.order)
    }

    /// Orders resting at `price`, front of the queue first.
    pub fn orders_at_level(&self, price: f64, side: Side) -> Vec<&Order> {
        self.levels(side)
            .get(price)
            .map(|queue| {
                queue
                    .iter(&self.orders)
                    .filter_map(|h| self.orders.get(h))
                    .map(|slot| &slot.order)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn best(&self, side: Side) -> Option<PriceLevel> {
        self.levels(side)
            .best()
            .map(|(price, queue)| PriceLevel::new(price, queue.total_quantity(&self.orders)))
    }

    /// Highest bid with the aggregate quantity at that price.
    #[inline]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.best(Side::Bid)
    }

    /// Lowest ask with the aggregate quantity at that price.
    #[inline]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.best(Side::Ask)
    }

    /// Number of orders at an exact price.
    pub fn orders_at_price(&self, price: f64, side: Side) -> usize {
        self.levels(side)
            .get(price)
            .map_or(0, LevelQueue::order_count)
    }

    /// Number of orders at the best price of `side`.
    pub fn orders_at_best(&self, side: Side) -> usize {
        self.levels(side)
            .best()
            .map_or(0, |(_, queue)| queue.order_count())
    }

    /// Aggregate quantity at an exact price.
    pub fn volume_at_price(&self, price: f64, side: Side) -> f64 {
        self.levels(side)
            .get(price)
            .map_or(0.0, |queue| queue.total_quantity(&self.orders))
    }

    /// Number of resting orders on `side`.
    pub fn order_count(&self, side: Side) -> usize {
        self.levels(side).iter().map(|(_, q)| q.order_count()).sum()
    }

    /// Number of resting orders on both sides.
    #[inline]
    pub fn total_orders(&self) -> usize {
        self.orders.len()
    }

    /// Number of distinct prices on `side`.
    #[inline]
    pub fn price_levels(&self, side: Side) -> usize {
        self.levels(side).len()
    }

    /// Total quantity over the first `n` price levels of `side`.
    pub fn volume_top_n(&self, side: Side, n: usize) -> f64 {
        self.levels(side)
            .iter()
            .take(n)
            .map(|(_, queue)| queue.total_quantity(&self.orders))
            .sum()
    }

    /// Quantity resting within `bps` basis points of `reference_price`.
    ///
    /// Same early-termination contract as the price-level book.
    pub fn volume_within_bps(&self, reference_price: f64, bps: f64, side: Side) -> f64 {
        if reference_price <= 0.0 || bps <= 0.0 {
            return 0.0;
        }

        let levels = self.levels(side);
        let bound = levels.bps_bound(reference_price, bps);
        levels
            .iter()
            .take_while(|&(price, _)| levels.within_bound(price, bound))
            .map(|(_, queue)| queue.total_quantity(&self.orders))
            .sum()
    }

    /// Mean resting quantity per order on `side`, 0 if the side is empty.
    pub fn average_order_size(&self, side: Side) -> f64 {
        let (volume, count) = self
            .levels(side)
            .iter()
            .fold((0.0, 0usize), |(volume, count), (_, queue)| {
                (
                    volume + queue.total_quantity(&self.orders),
                    count + queue.order_count(),
                )
            });
        if count == 0 {
            0.0
        } else {
            volume / count as f64
        }
    }

    #[inline]
    pub fn event_counters(&self) -> EventCounters {
        self.counters
    }

    /// Zero the lifecycle counters without touching resting orders.
    #[inline]
    pub fn reset_event_counters(&mut self) {
        self.counters = EventCounters::default();
    }

    #[inline]
    pub fn consistency(&self) -> BookConsistency {
        BookConsistency::from_quotes(
            self.bids.best().map(|(p, _)| p),
            self.asks.best().map(|(p, _)| p),
        )
    }

    /// Drop all orders and counters, back to uninitialized.
    pub fn reset(&mut self) {
        self.clear_orders();
        self.orphans.clear();
        self.counters = EventCounters::default();
        self.initialized = false;
    }

    /// Check that the identity and price indexes describe the same orders.
    pub fn indexes_consistent(&self) -> bool {
        if self.index.len() != self.orders.len() {
            return false;
        }

        let mut queued = 0usize;
        for side in [Side::Bid, Side::Ask] {
            for (price, queue) in self.levels(side).iter() {
                if queue.is_empty() {
                    return false;
                }
                queue.verify_against(price, &self.orders);
                let mut in_queue = 0usize;
                for handle in queue.iter(&self.orders) {
                    let Some(order) = self.orders.get(handle).map(|slot| &slot.order) else {
                        return false;
                    };
                    if order.side != side
                        || order.price != price
                        || self.index.get(&order.order_id) != Some(&handle)
                    {
                        return false;
                    }
                    in_queue += 1;
                }
                if in_queue != queue.order_count() {
                    return false;
                }
                queued += in_queue;
            }
        }
        queued == self.orders.len()
    }
}

impl DepthView for OrderLevelBook {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn best_bid(&self) -> Option<PriceLevel> {
        OrderLevelBook::best_bid(self)
    }

    fn best_ask(&self) -> Option<PriceLevel> {
        OrderLevelBook::best_ask(self)
    }

    fn volume_top_n(&self, side: Side, n: usize) -> f64 {
        OrderLevelBook::volume_top_n(self, side, n)
    }

    fn volume_within_bps(&self, reference_price: f64, bps: f64, side: Side) -> f64 {
        OrderLevelBook::volume_within_bps(self, reference_price, bps, side)
    }
}

impl ReconstructedBook for OrderLevelBook {
    type Record = OrderRecord;

    fn for_symbol(symbol: &str, config: &BookConfig) -> Self {
        Self::with_config(symbol, config.clone())
    }

    fn apply_record(&mut self, record: &OrderRecord) -> ApplySummary {
        OrderLevelBook::apply_record(self, record)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn consistency(&self) -> BookConsistency {
        OrderLevelBook::consistency(self)
    }

    fn reset(&mut self) {
        OrderLevelBook::reset(self)
    }

    fn take_orphans(&mut self) -> Vec<OrphanedEvent> {
        std::mem::take(&mut self.orphans)
    }
}
