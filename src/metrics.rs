//! Order book metrics computed on demand.
//!
//! - [`PriceLevelMetrics`]: top of book, spread, top-10 volumes, imbalance and
//!   depth within 10/25/50 bps of mid. Works on any [`DepthView`].
//! - [`OrderLevelMetrics`]: the same plus order counts, average order size and
//!   lifecycle event rates from an [`OrderLevelBook`].
//!
//! Calculators never read the clock; the caller passes the timestamp and, for
//! rates, the interval length. Every calculator accepts an empty book.

use serde::{Deserialize, Serialize};

use crate::lob::OrderLevelBook;
use crate::types::{PriceLevel, Side};

/// Levels per side summed into `bid_volume_top10` / `ask_volume_top10`.
pub const METRICS_DEPTH: usize = 10;

/// Bands (basis points around mid) reported as `depth_<n>_bps`.
pub const DEPTH_BANDS_BPS: [f64; 3] = [10.0, 25.0, 50.0];

/// Read-only view of a book shared by both granularities.
pub trait DepthView {
    fn symbol(&self) -> &str;

    fn best_bid(&self) -> Option<PriceLevel>;

    fn best_ask(&self) -> Option<PriceLevel>;

    /// Total quantity over the first `n` price levels of `side`.
    fn volume_top_n(&self, side: Side, n: usize) -> f64;

    /// Quantity within `bps` basis points of `reference_price` on `side`.
    fn volume_within_bps(&self, reference_price: f64, bps: f64, side: Side) -> f64;
}

/// (bid − ask) / (bid + ask), 0 when both are 0. Always within [-1, 1].
#[inline]
pub fn volume_imbalance(bid_volume: f64, ask_volume: f64) -> f64 {
    let total = bid_volume + ask_volume;
    if total > 0.0 {
        (bid_volume - ask_volume) / total
    } else {
        0.0
    }
}

// ============================================================================
// Price-level metrics
// ============================================================================

/// Aggregated-view metrics for one symbol at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevelMetrics {
    pub timestamp: String,
    pub symbol: String,

    /// Best bid price, 0 when the bid side is empty
    pub best_bid: f64,
    pub best_bid_qty: f64,

    /// Best ask price, 0 when the ask side is empty
    pub best_ask: f64,
    pub best_ask_qty: f64,

    /// ask − bid, 0 unless both sides are quoted
    pub spread: f64,

    /// spread / mid in basis points
    pub spread_bps: f64,

    pub mid_price: f64,

    pub bid_volume_top10: f64,
    pub ask_volume_top10: f64,

    /// Top-10 volume imbalance in [-1, 1]
    pub imbalance: f64,

    /// Bid + ask quantity within 10 bps of mid
    pub depth_10_bps: f64,
    pub depth_25_bps: f64,
    pub depth_50_bps: f64,
}

impl PriceLevelMetrics {
    /// Compute metrics from any book view.
    ///
    /// Top-10 volumes and imbalance are per side, so they are filled in even
    /// when the other side is empty (imbalance is then 1 or -1). The
    /// collector's live calculator leaves them at 0 in that case; spread, mid
    /// and the depth bands are 0 here too.
    ///
    /// ```
    /// use crypto_book_reconstructor::{PriceLevel, PriceLevelBook, PriceLevelMetrics};
    ///
    /// let mut book = PriceLevelBook::new("BTC/USD");
    /// book.apply_snapshot(&[PriceLevel::new(100.0, 5.0)], &[PriceLevel::new(100.5, 2.0)]);
    ///
    /// let metrics = PriceLevelMetrics::calculate(&book, "2024-01-01 00:00:00.000");
    /// assert_eq!(metrics.mid_price, 100.25);
    /// assert_eq!(metrics.spread, 0.5);
    /// ```
    pub fn calculate<V: DepthView + ?Sized>(view: &V, timestamp: impl Into<String>) -> Self {
        let bid = view.best_bid();
        let ask = view.best_ask();

        let mut metrics = Self {
            timestamp: timestamp.into(),
            symbol: view.symbol().to_string(),
            best_bid: bid.map_or(0.0, |l| l.price),
            best_bid_qty: bid.map_or(0.0, |l| l.quantity),
            best_ask: ask.map_or(0.0, |l| l.price),
            best_ask_qty: ask.map_or(0.0, |l| l.quantity),
            spread: 0.0,
            spread_bps: 0.0,
            mid_price: 0.0,
            bid_volume_top10: view.volume_top_n(Side::Bid, METRICS_DEPTH),
            ask_volume_top10: view.volume_top_n(Side::Ask, METRICS_DEPTH),
            imbalance: 0.0,
            depth_10_bps: 0.0,
            depth_25_bps: 0.0,
            depth_50_bps: 0.0,
        };
        metrics.imbalance = volume_imbalance(metrics.bid_volume_top10, metrics.ask_volume_top10);

        if let (Some(bid), Some(ask)) = (bid, ask) {
            let mid = (bid.price + ask.price) / 2.0;
            metrics.mid_price = mid;
            metrics.spread = ask.price - bid.price;
            if mid > 0.0 {
                metrics.spread_bps = metrics.spread / mid * 10_000.0;
            }

            let [d10, d25, d50] = DEPTH_BANDS_BPS.map(|bps| {
                view.volume_within_bps(mid, bps, Side::Bid)
                    + view.volume_within_bps(mid, bps, Side::Ask)
            });
            metrics.depth_10_bps = d10;
            metrics.depth_25_bps = d25;
            metrics.depth_50_bps = d50;
        }

        metrics
    }

    /// True if both sides were quoted when the metrics were taken.
    #[inline]
    pub fn has_both_sides(&self) -> bool {
        self.best_bid > 0.0 && self.best_ask > 0.0
    }
}

// ============================================================================
// Order-level metrics
// ============================================================================

/// Order-level metrics: the aggregated metrics plus order flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLevelMetrics {
    #[serde(flatten)]
    pub book: PriceLevelMetrics,

    pub bid_order_count: u64,
    pub ask_order_count: u64,

    /// Orders queued at the best bid price
    pub bid_orders_at_best: u64,
    pub ask_orders_at_best: u64,

    pub avg_bid_order_size: f64,
    pub avg_ask_order_size: f64,

    /// Events applied since the last counter reset
    pub add_events: u64,
    pub modify_events: u64,
    pub delete_events: u64,
    pub orphan_events: u64,

    /// Adds per second over the interval
    pub order_arrival_rate: f64,

    /// Deletes per second over the interval
    pub order_cancel_rate: f64,
}

impl OrderLevelMetrics {
    /// Compute metrics from an order-level book.
    ///
    /// Rates divide the current event counters by `interval_secs`; they are 0
    /// when the interval is not positive.
    pub fn calculate(book: &OrderLevelBook, timestamp: impl Into<String>, interval_secs: f64) -> Self {
        let counters = book.event_counters();
        let per_second = |count: u64| {
            if interval_secs > 0.0 {
                count as f64 / interval_secs
            } else {
                0.0
            }
        };

        Self {
            book: PriceLevelMetrics::calculate(book, timestamp),
            bid_order_count: book.order_count(Side::Bid) as u64,
            ask_order_count: book.order_count(Side::Ask) as u64,
            bid_orders_at_best: book.orders_at_best(Side::Bid) as u64,
            ask_orders_at_best: book.orders_at_best(Side::Ask) as u64,
            avg_bid_order_size: book.average_order_size(Side::Bid),
            avg_ask_order_size: book.average_order_size(Side::Ask),
            add_events: counters.add,
            modify_events: counters.modify,
            delete_events: counters.delete,
            orphan_events: counters.orphan,
            order_arrival_rate: per_second(counters.add),
            order_cancel_rate: per_second(counters.delete),
        }
    }
}
