//! Core data types for book records and reconstruction results.
//!
//! Records are the normalized shape handed over by the decoding layer:
//! - [`BookRecord`]: aggregated (L2) snapshot or update, price levels only
//! - [`OrderRecord`]: individual-order (L3) snapshot or update
//!
//! Prices and quantities are `f64` as published by the exchange; the engine
//! never rounds them. A level or order is only allowed to rest in a book when
//! its price is finite and positive and its quantity is finite and positive.

use serde::{Deserialize, Serialize};

/// Order side (bid or ask)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy side, best price is the highest
    Bid,
    /// Sell side, best price is the lowest
    Ask,
}

impl Side {
    /// Check if this is a bid.
    #[inline(always)]
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Bid)
    }

    /// Check if this is an ask.
    #[inline(always)]
    pub fn is_ask(self) -> bool {
        matches!(self, Side::Ask)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

/// Returns true if `price` may rest in a book.
#[inline]
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Returns true if `quantity` may rest in a book.
#[inline]
pub fn is_valid_quantity(quantity: f64) -> bool {
    quantity.is_finite() && quantity > 0.0
}

/// Single price level: price and aggregate resting quantity.
///
/// In the capture format a level is the pair `[price, quantity]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

impl PriceLevel {
    /// Create a new price level.
    #[inline]
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    /// True if this level can stand in a book (valid price, quantity > 0).
    #[inline]
    pub fn is_standing(&self) -> bool {
        is_valid_price(self.price) && is_valid_quantity(self.quantity)
    }

    /// True if this level is an update-removal (valid price, quantity == 0).
    #[inline]
    pub fn is_removal(&self) -> bool {
        is_valid_price(self.price) && self.quantity == 0.0
    }
}

impl From<[f64; 2]> for PriceLevel {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<PriceLevel> for [f64; 2] {
    fn from(level: PriceLevel) -> Self {
        [level.price, level.quantity]
    }
}

impl From<(f64, f64)> for PriceLevel {
    fn from((price, quantity): (f64, f64)) -> Self {
        Self::new(price, quantity)
    }
}

/// Whether a record replaces the book or mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// Full replacement of the book
    Snapshot,
    /// Incremental change since the previous record
    Update,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Snapshot => "snapshot",
            RecordType::Update => "update",
        }
    }
}

/// Lifecycle event carried by an order line in an L3 update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderEvent {
    /// New resting order
    Add,
    /// Price and/or quantity change of a resting order
    Modify,
    /// Order left the book (cancel or full fill)
    Delete,
    /// Snapshot entries carry no event; unknown tags land here too
    #[default]
    #[serde(rename = "", other)]
    Unspecified,
}

impl OrderEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderEvent::Add => "add",
            OrderEvent::Modify => "modify",
            OrderEvent::Delete => "delete",
            OrderEvent::Unspecified => "",
        }
    }
}

/// One order line of an L3 record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Exchange order identifier
    pub order_id: String,

    /// Limit price
    #[serde(rename = "limit_price")]
    pub price: f64,

    /// Resting quantity
    #[serde(rename = "order_qty")]
    pub quantity: f64,

    /// Exchange timestamp of the order (RFC 3339), may be empty
    #[serde(default)]
    pub timestamp: String,

    /// Lifecycle event, `Unspecified` on snapshot entries
    #[serde(default)]
    pub event: OrderEvent,
}

impl OrderLine {
    /// Create a snapshot entry (no event).
    pub fn new(order_id: impl Into<String>, price: f64, quantity: f64) -> Self {
        Self {
            order_id: order_id.into(),
            price,
            quantity,
            timestamp: String::new(),
            event: OrderEvent::Unspecified,
        }
    }

    /// Create an `add` event line.
    pub fn add(order_id: impl Into<String>, price: f64, quantity: f64) -> Self {
        Self::new(order_id, price, quantity).with_event(OrderEvent::Add)
    }

    /// Create a `modify` event line.
    pub fn modify(order_id: impl Into<String>, price: f64, quantity: f64) -> Self {
        Self::new(order_id, price, quantity).with_event(OrderEvent::Modify)
    }

    /// Create a `delete` event line. Price and quantity are not consulted.
    pub fn delete(order_id: impl Into<String>) -> Self {
        Self::new(order_id, 0.0, 0.0).with_event(OrderEvent::Delete)
    }

    /// Set the lifecycle event.
    pub fn with_event(mut self, event: OrderEvent) -> Self {
        self.event = event;
        self
    }

    /// Set the order timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// True if price and quantity allow the order to rest.
    #[inline]
    pub fn is_restable(&self) -> bool {
        is_valid_price(self.price) && is_valid_quantity(self.quantity)
    }
}

/// Common accessors of records routed by symbol.
pub trait SymbolRecord {
    fn symbol(&self) -> &str;
    fn record_type(&self) -> RecordType;
    fn timestamp(&self) -> &str;
}

/// Aggregated (L2) snapshot or update for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Receive timestamp, as written by the collector
    #[serde(default)]
    pub timestamp: String,

    pub symbol: String,

    #[serde(rename = "type")]
    pub record_type: RecordType,

    #[serde(default)]
    pub bids: Vec<PriceLevel>,

    #[serde(default)]
    pub asks: Vec<PriceLevel>,

    /// Exchange checksum, only meaningful on updates
    #[serde(default)]
    pub checksum: Option<u32>,
}

impl BookRecord {
    /// Create a snapshot record.
    pub fn snapshot(symbol: impl Into<String>, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self {
            timestamp: String::new(),
            symbol: symbol.into(),
            record_type: RecordType::Snapshot,
            bids,
            asks,
            checksum: None,
        }
    }

    /// Create an update record.
    pub fn update(symbol: impl Into<String>, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self {
            record_type: RecordType::Update,
            ..Self::snapshot(symbol, bids, asks)
        }
    }

    /// Attach the exchange checksum.
    pub fn with_checksum(mut self, checksum: u32) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Attach a timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}

impl SymbolRecord for BookRecord {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn record_type(&self) -> RecordType {
        self.record_type
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

/// Individual-order (L3) snapshot or update for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    #[serde(default)]
    pub timestamp: String,

    pub symbol: String,

    #[serde(rename = "type")]
    pub record_type: RecordType,

    #[serde(default)]
    pub bids: Vec<OrderLine>,

    #[serde(default)]
    pub asks: Vec<OrderLine>,

    #[serde(default)]
    pub checksum: Option<u32>,
}

impl OrderRecord {
    /// Create a snapshot record.
    pub fn snapshot(symbol: impl Into<String>, bids: Vec<OrderLine>, asks: Vec<OrderLine>) -> Self {
        Self {
            timestamp: String::new(),
            symbol: symbol.into(),
            record_type: RecordType::Snapshot,
            bids,
            asks,
            checksum: None,
        }
    }

    /// Create an update record.
    pub fn update(symbol: impl Into<String>, bids: Vec<OrderLine>, asks: Vec<OrderLine>) -> Self {
        Self {
            record_type: RecordType::Update,
            ..Self::snapshot(symbol, bids, asks)
        }
    }

    /// Attach a timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}

impl SymbolRecord for OrderRecord {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn record_type(&self) -> RecordType {
        self.record_type
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

/// A resting order in an [`OrderLevelBook`](crate::lob::OrderLevelBook).
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: String,
}

/// Book consistency status after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookConsistency {
    /// Book is valid: best_bid < best_ask
    Valid,
    /// Book is empty (no quotes on one or both sides)
    Empty,
    /// Book is locked: best_bid == best_ask
    Locked,
    /// Book is crossed: best_bid > best_ask
    Crossed,
}

impl BookConsistency {
    /// Classify a pair of best prices.
    #[inline]
    pub fn from_quotes(best_bid: Option<f64>, best_ask: Option<f64>) -> Self {
        match (best_bid, best_ask) {
            (Some(bid), Some(ask)) if bid < ask => BookConsistency::Valid,
            (Some(bid), Some(ask)) if bid == ask => BookConsistency::Locked,
            (Some(_), Some(_)) => BookConsistency::Crossed,
            _ => BookConsistency::Empty,
        }
    }

    /// Returns true if the book state is valid for analysis.
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, BookConsistency::Valid)
    }

    /// Returns true if the book is crossed.
    #[inline]
    pub fn is_crossed(&self) -> bool {
        matches!(self, BookConsistency::Crossed)
    }

    /// Returns true if the book is locked (bid == ask).
    #[inline]
    pub fn is_locked(&self) -> bool {
        matches!(self, BookConsistency::Locked)
    }

    /// Returns true if one or both sides are empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, BookConsistency::Empty)
    }
}

/// Result of applying one L3 event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Book state changed as instructed
    Applied,
    /// Modify/delete for an order id the book does not hold
    OrphanEvent,
    /// Line ignored: unknown event or unusable price/quantity
    InvalidInput,
}

/// A modify or delete that named an order id the book does not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedEvent {
    pub order_id: String,
    pub event: OrderEvent,
}

/// Checksum verification result attached to an applied update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumStatus {
    /// No checksum on the record, validation disabled, or a snapshot
    #[default]
    NotChecked,
    /// Local book matches the exchange checksum (or cannot be checked)
    Valid,
    /// Local book diverged from the exchange
    Mismatch { expected: u32, computed: u32 },
}

impl ChecksumStatus {
    #[inline]
    pub fn is_mismatch(&self) -> bool {
        matches!(self, ChecksumStatus::Mismatch { .. })
    }
}

/// What happened while applying one record to a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplySummary {
    /// Levels or events that changed the book
    pub applied: usize,
    /// Levels or lines ignored as malformed
    pub invalid: usize,
    /// Modify/delete events referencing unknown order ids
    pub orphaned: usize,
    /// Add events (or snapshot entries) that replaced an order with the same id
    pub duplicates: usize,
    /// Checksum verification result
    pub checksum: ChecksumStatus,
}

impl ApplySummary {
    /// Count one L3 event outcome.
    #[inline]
    pub fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Applied => self.applied += 1,
            EventOutcome::OrphanEvent => self.orphaned += 1,
            EventOutcome::InvalidInput => self.invalid += 1,
        }
    }

    /// True if nothing was ignored and the checksum did not fail.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.invalid == 0 && self.orphaned == 0 && !self.checksum.is_mismatch()
    }
}
