//! # Crypto-Book-Reconstructor
//!
//! Order book reconstruction from exchange snapshot and update streams.
//!
//! The engine consumes, per symbol, an ordered stream of snapshots and
//! incremental updates and keeps a queryable, checksum-verifiable view of the
//! resting book at two granularities:
//!
//! - **Aggregated (price-level)**: total resting quantity per price
//! - **Individual-order (order-level)**: every order with its id, price and
//!   quantity, driven by add/modify/delete events
//!
//! Books are passive: no matching, no trading logic, no I/O. Decoding capture
//! files, sampling metrics on an interval and writing CSV/JSON Lines live in
//! the surrounding modules and the `replay_book` binary.
//!
//! ## Features
//!
//! - **CRC-32 checksum validation** of the aggregated top 10 levels
//! - **Orphan event reporting**: modify/delete for unknown ids are surfaced,
//!   never silently dropped
//! - **Metrics**: spread, mid, top-10 volumes, imbalance, depth within
//!   10/25/50 bps, order counts and event rates
//! - **Multi-symbol sessions** with per-symbol statistics and warnings
//!
//! ## Quick Start
//!
//! ### Aggregated book
//!
//! ```rust
//! use crypto_book_reconstructor::{PriceLevel, PriceLevelBook, PriceLevelMetrics};
//!
//! let mut book = PriceLevelBook::new("BTC/USD");
//! book.apply_snapshot(
//!     &[PriceLevel::new(100.0, 5.0), PriceLevel::new(99.5, 3.0)],
//!     &[PriceLevel::new(100.5, 2.0), PriceLevel::new(101.0, 4.0)],
//! );
//!
//! assert_eq!(book.compute_checksum(), 3_164_300_868);
//!
//! let metrics = PriceLevelMetrics::calculate(&book, "2024-01-01 00:00:00.000");
//! assert_eq!(metrics.spread, 0.5);
//! ```
//!
//! ### Order-level book
//!
//! ```rust
//! use crypto_book_reconstructor::{EventOutcome, OrderLevelBook, OrderLine, Side};
//!
//! let mut book = OrderLevelBook::new("BTC/USD");
//! book.apply_snapshot(&[OrderLine::new("A", 100.0, 1.0)], &[]);
//!
//! let outcome = book.apply_event(Side::Bid, &OrderLine::modify("A", 101.0, 2.0));
//! assert_eq!(outcome, EventOutcome::Applied);
//! assert_eq!(book.orders_at_price(101.0, Side::Bid), 1);
//!
//! let orphan = book.apply_event(Side::Bid, &OrderLine::delete("missing"));
//! assert_eq!(orphan, EventOutcome::OrphanEvent);
//! ```
//!
//! ### Replaying a capture file
//!
//! ```ignore
//! use crypto_book_reconstructor::source::{JsonlSource, RecordSource};
//! use crypto_book_reconstructor::{BookConfig, BookRecord, MultiSymbolBooks, PriceLevelBook};
//!
//! let source: JsonlSource<_, BookRecord> = JsonlSource::open("book_raw.jsonl")?;
//! let mut session: MultiSymbolBooks<PriceLevelBook> = MultiSymbolBooks::new(BookConfig::default());
//!
//! for record in source.records()? {
//!     session.process(&record?)?;
//! }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Records and values: `BookRecord`, `OrderRecord`, `PriceLevel`, `Side` |
//! | [`checksum`] | CRC-32 table, checksum string, validation |
//! | [`lob`] | Books: `PriceLevelBook`, `OrderLevelBook`, `MultiSymbolBooks` |
//! | [`metrics`] | `DepthView`, `PriceLevelMetrics`, `OrderLevelMetrics` |
//! | [`warnings`] | Warning tracking: `WarningTracker`, `Warning`, `WarningCategory` |
//! | [`source`] | Record sources: `RecordSource`, `VecSource`, `JsonlSource` |
//! | [`sampler`] | Interval and timestamp parsing, `IntervalSampler` |
//! | [`export`] | CSV and JSON Lines writers |

pub mod checksum;
pub mod error;
pub mod export;
pub mod lob;
pub mod metrics;
pub mod sampler;
pub mod source;
pub mod types;
pub mod warnings;

// Re-exports - Core types
pub use error::{BookError, Result};
pub use types::{
    ApplySummary, BookConsistency, BookRecord, ChecksumStatus, EventOutcome, Order, OrderEvent,
    OrderLine, OrderRecord, OrphanedEvent, PriceLevel, RecordType, Side, SymbolRecord,
};

// Re-exports - Books
pub use lob::{
    BookConfig, EventCounters, MultiSymbolBooks, OrderLevelBook, PriceLevelBook,
    ReconstructedBook, SymbolStats,
};

// Re-exports - Metrics
pub use metrics::{DepthView, OrderLevelMetrics, PriceLevelMetrics};

// Re-exports - Warnings
pub use warnings::{
    Warning, WarningCategory, WarningSummary, WarningTracker, WarningTrackerConfig,
};

// Re-exports - Sources, sampling, export
pub use export::{CsvWriter, JsonlWriter, OutputFormat, PerSymbolWriter};
pub use sampler::{parse_interval, parse_timestamp, IntervalSampler};
pub use source::{JsonlSource, RecordSource, SourceMetadata, VecSource};
