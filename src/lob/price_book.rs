//! Aggregated (price-level) book for one symbol.
//!
//! Implementation:
//! - one [`SideBook`] per side mapping price → aggregate quantity
//! - snapshots replace the whole book, updates upsert/remove single levels
//! - checksum verification over the top 10 levels of each side
//!
//! Invariant: no stored level has a quantity ≤ 0 or an invalid price. Input
//! that would break it is dropped and counted in [`ApplySummary::invalid`].

use super::config::BookConfig;
use super::multi_symbol::ReconstructedBook;
use super::side_book::SideBook;
use crate::checksum::{self, CHECKSUM_DEPTH};
use crate::metrics::DepthView;
use crate::types::{
    ApplySummary, BookConsistency, BookRecord, ChecksumStatus, PriceLevel, RecordType, Side,
};

/// Price-level book for a single symbol.
///
/// ```
/// use crypto_book_reconstructor::{PriceLevel, PriceLevelBook};
///
/// let mut book = PriceLevelBook::new("BTC/USD");
/// book.apply_snapshot(
///     &[PriceLevel::new(100.0, 5.0), PriceLevel::new(99.5, 3.0)],
///     &[PriceLevel::new(100.5, 2.0), PriceLevel::new(101.0, 4.0)],
/// );
///
/// assert_eq!(book.best_bid(), Some(PriceLevel::new(100.0, 5.0)));
/// assert_eq!(book.best_ask(), Some(PriceLevel::new(100.5, 2.0)));
/// ```
#[derive(Debug, Clone)]
pub struct PriceLevelBook {
    symbol: String,
    config: BookConfig,

    /// price -> quantity, walked highest first
    bids: SideBook<f64>,

    /// price -> quantity, walked lowest first
    asks: SideBook<f64>,

    /// Set by the first snapshot
    initialized: bool,
}

impl PriceLevelBook {
    /// Create an empty, uninitialized book.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_config(symbol, BookConfig::default())
    }

    /// Create an empty book with custom configuration.
    pub fn with_config(symbol: impl Into<String>, config: BookConfig) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            bids: SideBook::new(Side::Bid),
            asks: SideBook::new(Side::Ask),
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

    /// True once a snapshot has been applied.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Replace the book with a snapshot.
    ///
    /// Levels with quantity ≤ 0 are protocol violations in a snapshot and are
    /// dropped.
    pub fn apply_snapshot(&mut self, bids: &[PriceLevel], asks: &[PriceLevel]) -> ApplySummary {
        self.bids.clear();
        self.asks.clear();

        let mut summary = ApplySummary::default();
        Self::insert_snapshot_levels(&mut self.bids, bids, &mut summary);
        Self::insert_snapshot_levels(&mut self.asks, asks, &mut summary);

        self.initialized = true;
        summary
    }

    /// Apply incremental level changes.
    ///
    /// quantity > 0 upserts the level, quantity == 0 removes it (a missing
    /// level is fine), anything else is ignored.
    pub fn apply_update(&mut self, bids: &[PriceLevel], asks: &[PriceLevel]) -> ApplySummary {
        let mut summary = ApplySummary::default();
        Self::update_levels(&mut self.bids, bids, &mut summary);
        Self::update_levels(&mut self.asks, asks, &mut summary);
        summary
    }

    /// Apply a decoded record, verifying its checksum when configured.
    pub fn apply_record(&mut self, record: &BookRecord) -> ApplySummary {
        match record.record_type {
            RecordType::Snapshot => self.apply_snapshot(&record.bids, &record.asks),
            RecordType::Update => {
                let mut summary = self.apply_update(&record.bids, &record.asks);
                if let (true, Some(expected)) = (self.config.validate_checksums, record.checksum) {
                    summary.checksum = self.checksum_status(expected);
                }
                summary
            }
        }
    }

    #[inline]
    fn insert_snapshot_levels(
        side: &mut SideBook<f64>,
        levels: &[PriceLevel],
        summary: &mut ApplySummary,
    ) {
        for level in levels {
            if level.is_standing() {
                if side.insert(level.price, level.quantity).is_some() {
                    summary.duplicates += 1;
                }
                summary.applied += 1;
            } else {
                summary.invalid += 1;
            }
        }
    }

    #[inline]
    fn update_levels(side: &mut SideBook<f64>, levels: &[PriceLevel], summary: &mut ApplySummary) {
        for level in levels {
            if level.is_standing() {
                side.insert(level.price, level.quantity);
                summary.applied += 1;
            } else if level.is_removal() {
                side.remove(level.price);
                summary.applied += 1;
            } else {
                summary.invalid += 1;
            }
        }
    }

    #[inline]
    fn side(&self, side: Side) -> &SideBook<f64> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Highest bid.
    #[inline]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best().map(|(price, &qty)| PriceLevel::new(price, qty))
    }

    /// Lowest ask.
    #[inline]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best().map(|(price, &qty)| PriceLevel::new(price, qty))
    }

    /// First `n` bid levels, highest first.
    pub fn top_n_bids(&self, n: usize) -> Vec<PriceLevel> {
        self.top_n(Side::Bid, n)
    }

    /// First `n` ask levels, lowest first.
    pub fn top_n_asks(&self, n: usize) -> Vec<PriceLevel> {
        self.top_n(Side::Ask, n)
    }

    /// First `n` levels of `side` in book order.
    pub fn top_n(&self, side: Side, n: usize) -> Vec<PriceLevel> {
        self.side(side)
            .iter()
            .take(n)
            .map(|(price, &qty)| PriceLevel::new(price, qty))
            .collect()
    }

    /// Total quantity over the first `n` levels of `side`.
    pub fn volume_top_n(&self, side: Side, n: usize) -> f64 {
        self.side(side).iter().take(n).map(|(_, &qty)| qty).sum()
    }

    /// Quantity resting within `bps` basis points of `reference_price`.
    ///
    /// Walks best-first and stops at the first level outside the band.
    pub fn volume_within_bps(&self, reference_price: f64, bps: f64, side: Side) -> f64 {
        if reference_price <= 0.0 || bps <= 0.0 {
            return 0.0;
        }

        let levels = self.side(side);
        let bound = levels.bps_bound(reference_price, bps);
        levels
            .iter()
            .take_while(|&(price, _)| levels.within_bound(price, bound))
            .map(|(_, &qty)| qty)
            .sum()
    }

    /// Quantity at an exact price, 0 if the level does not exist.
    #[inline]
    pub fn quantity_at(&self, price: f64, side: Side) -> f64 {
        self.side(side).get(price).copied().unwrap_or(0.0)
    }

    /// CRC-32 of the current top of book.
    pub fn compute_checksum(&self) -> u32 {
        checksum::compute_checksum(
            &self.top_n_asks(CHECKSUM_DEPTH),
            &self.top_n_bids(CHECKSUM_DEPTH),
        )
    }

    /// Compare the book against an exchange checksum.
    ///
    /// A book with an empty side is reported valid.
    pub fn validate_checksum(&self, expected: u32) -> bool {
        checksum::validate(
            &self.top_n_asks(CHECKSUM_DEPTH),
            &self.top_n_bids(CHECKSUM_DEPTH),
            expected,
        )
    }

    fn checksum_status(&self, expected: u32) -> ChecksumStatus {
        if self.bids.is_empty() || self.asks.is_empty() {
            return ChecksumStatus::Valid;
        }
        let computed = self.compute_checksum();
        if computed == expected {
            ChecksumStatus::Valid
        } else {
            ChecksumStatus::Mismatch { expected, computed }
        }
    }

    /// Classify the current top of book.
    #[inline]
    pub fn consistency(&self) -> BookConsistency {
        BookConsistency::from_quotes(
            self.bids.best().map(|(p, _)| p),
            self.asks.best().map(|(p, _)| p),
        )
    }

    #[inline]
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    #[inline]
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Clear all levels and return to the uninitialized state.
    pub fn reset(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.initialized = false;
    }
}

impl DepthView for PriceLevelBook {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn best_bid(&self) -> Option<PriceLevel> {
        PriceLevelBook::best_bid(self)
    }

    fn best_ask(&self) -> Option<PriceLevel> {
        PriceLevelBook::best_ask(self)
    }

    fn volume_top_n(&self, side: Side, n: usize) -> f64 {
        PriceLevelBook::volume_top_n(self, side, n)
    }

    fn volume_within_bps(&self, reference_price: f64, bps: f64, side: Side) -> f64 {
        PriceLevelBook::volume_within_bps(self, reference_price, bps, side)
    }
}

impl ReconstructedBook for PriceLevelBook {
    type Record = BookRecord;

    fn for_symbol(symbol: &str, config: &BookConfig) -> Self {
        Self::with_config(symbol, config.clone())
    }

    fn apply_record(&mut self, record: &BookRecord) -> ApplySummary {
        PriceLevelBook::apply_record(self, record)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn consistency(&self) -> BookConsistency {
        PriceLevelBook::consistency(self)
    }

    fn reset(&mut self) {
        PriceLevelBook::reset(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lv(price: f64, quantity: f64) -> PriceLevel {
        PriceLevel::new(price, quantity)
    }

    fn scenario_book() -> PriceLevelBook {
        let mut book = PriceLevelBook::new("BTC/USD");
        book.apply_snapshot(
            &[lv(100.0, 5.0), lv(99.5, 3.0)],
            &[lv(100.5, 2.0), lv(101.0, 4.0)],
        );
        book
    }

    #[test]
    fn test_new_book_is_uninitialized() {
        let book = PriceLevelBook::new("BTC/USD");
        assert!(!book.is_initialized());
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert_eq!(book.consistency(), BookConsistency::Empty);
    }

    #[test]
    fn test_snapshot_sets_top_of_book() {
        let book = scenario_book();
        assert!(book.is_initialized());
        assert_eq!(book.best_bid(), Some(lv(100.0, 5.0)));
        assert_eq!(book.best_ask(), Some(lv(100.5, 2.0)));
        assert_eq!(book.bid_levels(), 2);
        assert_eq!(book.ask_levels(), 2);
        assert!(book.consistency().is_valid());
    }

    #[test]
    fn test_snapshot_drops_non_positive_levels() {
        let mut book = PriceLevelBook::new("BTC/USD");
        let summary = book.apply_snapshot(
            &[lv(100.0, 5.0), lv(99.0, 0.0), lv(98.0, -1.0)],
            &[lv(101.0, 1.0), lv(f64::NAN, 1.0)],
        );
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.invalid, 3);
        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.ask_levels(), 1);
    }

    #[test]
    fn test_snapshot_replaces_previous_state() {
        let mut book = scenario_book();
        book.apply_snapshot(&[lv(50.0, 1.0)], &[lv(51.0, 1.0)]);
        assert_eq!(book.best_bid(), Some(lv(50.0, 1.0)));
        assert_eq!(book.best_ask(), Some(lv(51.0, 1.0)));
        assert_eq!(book.bid_levels(), 1);
    }

    #[test]
    fn test_update_upserts_and_removes() {
        let mut book = scenario_book();
        let summary = book.apply_update(
            &[lv(100.0, 0.0), lv(99.8, 1.0)],
            &[lv(100.5, 7.0)],
        );
        assert_eq!(summary.applied, 3);
        assert_eq!(book.best_bid(), Some(lv(99.8, 1.0)));
        assert_eq!(book.best_ask(), Some(lv(100.5, 7.0)));
        assert_eq!(book.quantity_at(100.0, Side::Bid), 0.0);
    }

    #[test]
    fn test_remove_missing_level_is_noop() {
        let mut book = scenario_book();
        let summary = book.apply_update(&[lv(42.0, 0.0)], &[]);
        assert!(summary.is_clean());
        assert_eq!(book.bid_levels(), 2);
        assert_eq!(book.top_n_bids(10), vec![lv(100.0, 5.0), lv(99.5, 3.0)]);
    }

    #[test]
    fn test_update_ignores_negative_quantity() {
        let mut book = scenario_book();
        let summary = book.apply_update(&[lv(100.0, -3.0)], &[]);
        assert_eq!(summary.invalid, 1);
        assert_eq!(book.best_bid(), Some(lv(100.0, 5.0)));
    }

    #[test]
    fn test_update_on_uninitialized_book() {
        let mut book = PriceLevelBook::new("ETH/USD");
        book.apply_update(&[lv(10.0, 1.0)], &[]);
        assert!(!book.is_initialized());
        assert_eq!(book.best_bid(), Some(lv(10.0, 1.0)));
    }

    #[test]
    fn test_top_n_fewer_levels_than_requested() {
        let book = scenario_book();
        assert_eq!(book.top_n_asks(1), vec![lv(100.5, 2.0)]);
        assert_eq!(book.top_n_asks(5).len(), 2);
        assert!(book.top_n_bids(0).is_empty());
    }

    #[test]
    fn test_volume_within_bps_stops_at_band_edge() {
        let mut book = PriceLevelBook::new("BTC/USD");
        book.apply_snapshot(
            &[lv(100.0, 1.0), lv(99.95, 2.0), lv(99.0, 4.0)],
            &[lv(100.1, 1.0), lv(100.2, 2.0), lv(102.0, 4.0)],
        );
        // 10 bps around 100.05 -> [99.949.., 100.150..]
        assert_eq!(book.volume_within_bps(100.05, 10.0, Side::Bid), 3.0);
        assert_eq!(book.volume_within_bps(100.05, 10.0, Side::Ask), 1.0);
        assert_eq!(book.volume_within_bps(100.05, 500.0, Side::Ask), 7.0);
        assert_eq!(book.volume_within_bps(0.0, 10.0, Side::Ask), 0.0);
        assert_eq!(book.volume_within_bps(100.05, 0.0, Side::Bid), 0.0);
    }

    #[test]
    fn test_volume_top_n() {
        let book = scenario_book();
        assert_eq!(book.volume_top_n(Side::Bid, 10), 8.0);
        assert_eq!(book.volume_top_n(Side::Ask, 1), 2.0);
    }

    #[test]
    fn test_checksum_on_update_record() {
        let mut book = PriceLevelBook::new("BTC/USD");
        book.apply_record(&BookRecord::snapshot(
            "BTC/USD",
            vec![lv(100.0, 5.0), lv(99.5, 3.0)],
            vec![lv(100.5, 2.0)],
        ));

        let good = BookRecord::update("BTC/USD", vec![], vec![lv(101.0, 4.0)]).with_checksum(3_164_300_868);
        assert_eq!(book.apply_record(&good).checksum, ChecksumStatus::Valid);
        assert!(book.validate_checksum(3_164_300_868));

        let bad = BookRecord::update("BTC/USD", vec![], vec![]).with_checksum(1);
        assert_eq!(
            book.apply_record(&bad).checksum,
            ChecksumStatus::Mismatch {
                expected: 1,
                computed: 3_164_300_868
            }
        );
    }

    #[test]
    fn test_checksum_disabled() {
        let config = BookConfig::new().with_checksum_validation(false);
        let mut book = PriceLevelBook::with_config("BTC/USD", config);
        book.apply_snapshot(&[lv(1.0, 1.0)], &[lv(2.0, 1.0)]);
        let record = BookRecord::update("BTC/USD", vec![], vec![]).with_checksum(1);
        assert_eq!(book.apply_record(&record).checksum, ChecksumStatus::NotChecked);
    }

    #[test]
    fn test_one_sided_book_checksum_is_valid() {
        let mut book = PriceLevelBook::new("BTC/USD");
        book.apply_snapshot(&[lv(1.0, 1.0)], &[]);
        assert!(book.validate_checksum(0xDEAD_BEEF));
        let record = BookRecord::update("BTC/USD", vec![], vec![]).with_checksum(5);
        assert_eq!(book.apply_record(&record).checksum, ChecksumStatus::Valid);
    }

    #[test]
    fn test_reset() {
        let mut book = scenario_book();
        book.reset();
        assert!(!book.is_initialized());
        assert_eq!(book.bid_levels(), 0);
        assert_eq!(book.ask_levels(), 0);
    }
}
