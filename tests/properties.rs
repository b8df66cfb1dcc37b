//! Property-based tests for book invariants.
//!
//! - Valid updates never cross the aggregated book
//! - Snapshots are idempotent
//! - Order-level indexes stay consistent under arbitrary event streams
//! - Imbalance stays within [-1, 1]
//! - The compile-time CRC-32 table matches a reference implementation

use proptest::prelude::*;

use crypto_book_reconstructor::checksum::crc32;
use crypto_book_reconstructor::metrics::volume_imbalance;
use crypto_book_reconstructor::{
    OrderEvent, OrderLevelBook, OrderLine, PriceLevel, PriceLevelBook, PriceLevelMetrics, Side,
};

/// Bid prices strictly below every ask price.
fn arb_bid_price() -> impl Strategy<Value = f64> {
    (9_000u32..10_000u32).prop_map(|ticks| f64::from(ticks) / 100.0)
}

fn arb_ask_price() -> impl Strategy<Value = f64> {
    (10_001u32..11_000u32).prop_map(|ticks| f64::from(ticks) / 100.0)
}

/// Quantity, zero meaning removal in updates.
fn arb_update_quantity() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), (1u32..10_000u32).prop_map(|q| f64::from(q) / 1_000.0)]
}

fn arb_quantity() -> impl Strategy<Value = f64> {
    (1u32..10_000u32).prop_map(|q| f64::from(q) / 1_000.0)
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Bid), Just(Side::Ask)]
}

/// One aggregated update: bid levels and ask levels.
fn arb_update() -> impl Strategy<Value = (Vec<PriceLevel>, Vec<PriceLevel>)> {
    (
        prop::collection::vec((arb_bid_price(), arb_update_quantity()), 0..5),
        prop::collection::vec((arb_ask_price(), arb_update_quantity()), 0..5),
    )
        .prop_map(|(bids, asks)| {
            (
                bids.into_iter().map(PriceLevel::from).collect(),
                asks.into_iter().map(PriceLevel::from).collect(),
            )
        })
}

/// An order-level event over a small id space, so that modifies and
/// deletes hit resting orders as well as unknown ids.
fn arb_order_event() -> impl Strategy<Value = (Side, OrderLine)> {
    (
        arb_side(),
        0u8..12,
        prop_oneof![
            Just(OrderEvent::Add),
            Just(OrderEvent::Modify),
            Just(OrderEvent::Delete)
        ],
        (9_990u32..10_010u32).prop_map(|ticks| f64::from(ticks) / 100.0),
        arb_quantity(),
    )
        .prop_map(|(side, id, event, price, quantity)| {
            let line = OrderLine::new(format!("o{id}"), price, quantity).with_event(event);
            (side, line)
        })
}

// ============================================================================
// Aggregated book
// ============================================================================

proptest! {
    #[test]
    fn prop_valid_updates_never_cross(
        updates in prop::collection::vec(arb_update(), 1..40)
    ) {
        let mut book = PriceLevelBook::new("PROP");
        book.apply_snapshot(&[PriceLevel::new(99.0, 1.0)], &[PriceLevel::new(101.0, 1.0)]);

        for (bids, asks) in &updates {
            let summary = book.apply_update(bids, asks);
            prop_assert_eq!(summary.invalid, 0);

            if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
                prop_assert!(bid.price < ask.price);
            }
            prop_assert!(!book.consistency().is_crossed());
        }
    }

    #[test]
    fn prop_snapshot_is_idempotent(
        bids in prop::collection::vec((arb_bid_price(), arb_quantity()), 0..20),
        asks in prop::collection::vec((arb_ask_price(), arb_quantity()), 0..20),
    ) {
        let bids: Vec<PriceLevel> = bids.into_iter().map(PriceLevel::from).collect();
        let asks: Vec<PriceLevel> = asks.into_iter().map(PriceLevel::from).collect();

        let mut book = PriceLevelBook::new("PROP");
        book.apply_snapshot(&bids, &asks);
        let first = (book.top_n_bids(usize::MAX), book.top_n_asks(usize::MAX), book.compute_checksum());

        book.apply_snapshot(&bids, &asks);
        let second = (book.top_n_bids(usize::MAX), book.top_n_asks(usize::MAX), book.compute_checksum());

        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_levels_sorted_best_first(
        updates in prop::collection::vec(arb_update(), 1..20)
    ) {
        let mut book = PriceLevelBook::new("PROP");
        book.apply_snapshot(&[], &[]);
        for (bids, asks) in &updates {
            book.apply_update(bids, asks);
        }

        let bids = book.top_n_bids(usize::MAX);
        let asks = book.top_n_asks(usize::MAX);
        prop_assert!(bids.windows(2).all(|w| w[0].price > w[1].price));
        prop_assert!(asks.windows(2).all(|w| w[0].price < w[1].price));
        prop_assert!(bids.iter().chain(asks.iter()).all(|level| level.quantity > 0.0));
    }
}

// ============================================================================
// Order-level book
// ============================================================================

proptest! {
    #[test]
    fn prop_order_indexes_stay_consistent(
        events in prop::collection::vec(arb_order_event(), 1..200)
    ) {
        let mut book = OrderLevelBook::new("PROP");
        book.apply_snapshot(&[], &[]);

        for (side, line) in &events {
            book.apply_event(*side, line);
            prop_assert!(book.indexes_consistent());
        }

        prop_assert_eq!(
            book.order_count(Side::Bid) + book.order_count(Side::Ask),
            book.total_orders()
        );
    }

    #[test]
    fn prop_modify_relocates_order(
        side in arb_side(),
        from in arb_bid_price(),
        to in arb_bid_price(),
        quantity in arb_quantity(),
    ) {
        let mut book = OrderLevelBook::new("PROP");
        book.apply_event(side, &OrderLine::add("X", from, 1.0));
        book.apply_event(side, &OrderLine::modify("X", to, quantity));

        let order = book.order("X");
        prop_assert!(order.is_some());
        if let Some(order) = order {
            prop_assert_eq!(order.price, to);
            prop_assert_eq!(order.quantity, quantity);
        }
        prop_assert_eq!(book.orders_at_price(to, side), 1);
        if from != to {
            prop_assert_eq!(book.orders_at_price(from, side), 0);
        }
        prop_assert_eq!(book.price_levels(side), 1);
    }

    #[test]
    fn prop_orphans_leave_book_unchanged(
        id in 100u32..200,
        price in arb_bid_price(),
    ) {
        let mut book = OrderLevelBook::new("PROP");
        book.apply_snapshot(&[OrderLine::new("resting", 95.0, 1.0)], &[]);

        let ghost = format!("g{id}");
        book.apply_event(Side::Bid, &OrderLine::modify(ghost.clone(), price, 1.0));
        book.apply_event(Side::Bid, &OrderLine::delete(ghost));

        prop_assert_eq!(book.total_orders(), 1);
        prop_assert_eq!(book.event_counters().orphan, 2);
        prop_assert_eq!(book.best_bid(), Some(PriceLevel::new(95.0, 1.0)));
    }
}

// ============================================================================
// Metrics and checksum
// ============================================================================

proptest! {
    #[test]
    fn prop_imbalance_bounded(bid in 0.0f64..1e9, ask in 0.0f64..1e9) {
        let imbalance = volume_imbalance(bid, ask);
        prop_assert!((-1.0..=1.0).contains(&imbalance));
    }

    #[test]
    fn prop_book_imbalance_bounded(
        bids in prop::collection::vec((arb_bid_price(), arb_quantity()), 0..15),
        asks in prop::collection::vec((arb_ask_price(), arb_quantity()), 0..15),
    ) {
        let bids: Vec<PriceLevel> = bids.into_iter().map(PriceLevel::from).collect();
        let asks: Vec<PriceLevel> = asks.into_iter().map(PriceLevel::from).collect();

        let mut book = PriceLevelBook::new("PROP");
        book.apply_snapshot(&bids, &asks);
        let metrics = PriceLevelMetrics::calculate(&book, "t");

        prop_assert!((-1.0..=1.0).contains(&metrics.imbalance));
        if bids.is_empty() && asks.is_empty() {
            prop_assert_eq!(metrics.imbalance, 0.0);
        }
    }

    #[test]
    fn prop_crc32_matches_reference(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(crc32(&bytes), crc32fast::hash(&bytes));
    }
}

#[test]
fn test_empty_imbalance_is_zero() {
    assert_eq!(volume_imbalance(0.0, 0.0), 0.0);
}
