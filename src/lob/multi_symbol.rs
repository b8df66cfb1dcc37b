//! Multi-symbol book manager.
//!
//! Owns one book per symbol, created lazily on the first record for that
//! symbol. Works with either book variant through [`ReconstructedBook`].
//! Feed anomalies are logged, counted per symbol and recorded in a
//! [`WarningTracker`].

use ahash::AHashMap;
use serde::Serialize;

use super::config::BookConfig;
use crate::error::{BookError, Result};
use crate::metrics::DepthView;
use crate::types::{
    ApplySummary, BookConsistency, ChecksumStatus, OrphanedEvent, RecordType, SymbolRecord,
};
use crate::warnings::{Warning, WarningCategory, WarningTracker, WarningTrackerConfig};

/// A per-symbol book that can be driven by decoded records.
pub trait ReconstructedBook: DepthView + Sized {
    /// Record type this book consumes.
    type Record: SymbolRecord;

    /// Create an empty book for `symbol`.
    fn for_symbol(symbol: &str, config: &BookConfig) -> Self;

    /// Apply one snapshot or update.
    fn apply_record(&mut self, record: &Self::Record) -> ApplySummary;

    fn is_initialized(&self) -> bool;

    fn consistency(&self) -> BookConsistency;

    fn reset(&mut self);

    /// Drain the orphaned events of the last applied record.
    fn take_orphans(&mut self) -> Vec<OrphanedEvent> {
        Vec::new()
    }
}

/// Per-symbol processing statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolStats {
    /// Records routed to this symbol
    pub messages: u64,
    pub snapshots: u64,
    pub updates: u64,

    /// Levels or events that changed the book
    pub applied: u64,
    pub invalid_inputs: u64,
    pub orphan_events: u64,
    pub duplicate_orders: u64,

    pub checksum_checks: u64,
    pub checksum_failures: u64,

    /// Records after which the book was crossed
    pub crossed_records: u64,

    /// Updates applied before the first snapshot
    pub uninitialized_updates: u64,

    #[serde(skip)]
    was_crossed: bool,
}

/// Multi-symbol book manager.
///
/// # Example
/// ```
/// use crypto_book_reconstructor::{BookConfig, BookRecord, MultiSymbolBooks, PriceLevel, PriceLevelBook};
///
/// let mut session: MultiSymbolBooks<PriceLevelBook> = MultiSymbolBooks::new(BookConfig::default());
///
/// let record = BookRecord::snapshot(
///     "BTC/USD",
///     vec![PriceLevel::new(100.0, 1.0)],
///     vec![PriceLevel::new(101.0, 1.0)],
/// );
/// session.process(&record).unwrap();
///
/// let book = session.book("BTC/USD").unwrap();
/// assert_eq!(book.best_bid(), Some(PriceLevel::new(100.0, 1.0)));
/// ```
pub struct MultiSymbolBooks<B> {
    config: BookConfig,

    /// Map of symbol -> book
    books: AHashMap<String, B>,

    stats: AHashMap<String, SymbolStats>,

    warnings: WarningTracker,

    total_messages: u64,
}

impl<B: ReconstructedBook> MultiSymbolBooks<B> {
    /// Create a new manager. Books inherit `config`.
    pub fn new(config: BookConfig) -> Self {
        Self {
            config,
            books: AHashMap::new(),
            stats: AHashMap::new(),
            warnings: WarningTracker::new(),
            total_messages: 0,
        }
    }

    /// Only route records for the given symbols.
    pub fn with_symbol_filter<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.with_symbols(symbols);
        self
    }

    /// Replace the warning tracker configuration.
    pub fn with_warning_config(mut self, config: WarningTrackerConfig) -> Self {
        self.warnings = WarningTracker::with_config(config);
        self
    }

    #[inline]
    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    /// Route a record to its symbol's book.
    ///
    /// Returns `Ok(None)` when the symbol is filtered out.
    pub fn process(&mut self, record: &B::Record) -> Result<Option<ApplySummary>> {
        let symbol = record.symbol();
        if symbol.is_empty() {
            return Err(BookError::generic("record without symbol"));
        }
        if !self.config.accepts(symbol) {
            return Ok(None);
        }

        if !self.books.contains_key(symbol) {
            log::info!("Tracking new symbol {}", symbol);
            self.books
                .insert(symbol.to_string(), B::for_symbol(symbol, &self.config));
            self.stats.insert(symbol.to_string(), SymbolStats::default());
        }

        let (Some(book), Some(stats)) = (self.books.get_mut(symbol), self.stats.get_mut(symbol))
        else {
            return Err(BookError::SymbolNotFound(symbol.to_string()));
        };

        let record_type = record.record_type();
        let first_uninitialized =
            record_type == RecordType::Update && !book.is_initialized();

        let summary = book.apply_record(record);
        let orphans = book.take_orphans();
        let consistency = book.consistency();

        self.total_messages += 1;
        stats.messages += 1;
        match record_type {
            RecordType::Snapshot => stats.snapshots += 1,
            RecordType::Update => stats.updates += 1,
        }
        stats.applied += summary.applied as u64;
        stats.invalid_inputs += summary.invalid as u64;
        stats.orphan_events += summary.orphaned as u64;
        stats.duplicate_orders += summary.duplicates as u64;

        let mut raised: Vec<(WarningCategory, String)> = Vec::new();

        if first_uninitialized {
            if stats.uninitialized_updates == 0 {
                raised.push((
                    WarningCategory::UninitializedUpdate,
                    "update applied before first snapshot".to_string(),
                ));
            }
            stats.uninitialized_updates += 1;
        }

        match summary.checksum {
            ChecksumStatus::NotChecked => {}
            ChecksumStatus::Valid => stats.checksum_checks += 1,
            ChecksumStatus::Mismatch { expected, computed } => {
                stats.checksum_checks += 1;
                stats.checksum_failures += 1;
                raised.push((
                    WarningCategory::ChecksumMismatch,
                    format!("checksum mismatch: expected {expected}, computed {computed}"),
                ));
            }
        }

        if summary.invalid > 0 {
            raised.push((
                WarningCategory::InvalidInput,
                format!("{} malformed line(s) ignored", summary.invalid),
            ));
        }
        if summary.duplicates > 0 && record_type == RecordType::Update {
            raised.push((
                WarningCategory::DuplicateOrder,
                format!("{} add(s) replaced a resting order", summary.duplicates),
            ));
        }

        let crossed = consistency.is_crossed();
        if crossed {
            stats.crossed_records += 1;
            if !stats.was_crossed {
                raised.push((WarningCategory::CrossedBook, "book crossed".to_string()));
            }
        }
        stats.was_crossed = crossed;

        for (category, message) in raised {
            if self.config.log_warnings {
                match category.severity() {
                    1 => log::debug!("[{}] {}: {}", category.name(), symbol, message),
                    _ => log::warn!("[{}] {}: {}", category.name(), symbol, message),
                }
            }
            let id = self.warnings.next_id();
            let mut warning = Warning::new(id, category, symbol, message);
            if !record.timestamp().is_empty() {
                warning = warning.with_data_timestamp(record.timestamp());
            }
            if let ChecksumStatus::Mismatch { expected, computed } = summary.checksum {
                if category == WarningCategory::ChecksumMismatch {
                    warning = warning
                        .with_context("expected", expected)
                        .with_context("computed", computed);
                }
            }
            self.warnings.record(warning);
        }

        let timestamp = Some(record.timestamp()).filter(|ts| !ts.is_empty());
        for orphan in orphans {
            let message = format!("{} for unknown order id", orphan.event.as_str());
            if self.config.log_warnings {
                log::debug!(
                    "[{}] {}: {} {}",
                    WarningCategory::OrphanEvent.name(),
                    symbol,
                    message,
                    orphan.order_id
                );
            }
            self.warnings.record_order_warning(
                WarningCategory::OrphanEvent,
                symbol,
                message,
                &orphan.order_id,
                timestamp,
            );
        }

        Ok(Some(summary))
    }

    /// Route every record in order, stopping at the first error.
    pub fn process_all<'a, I>(&mut self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a B::Record>,
        B::Record: 'a,
    {
        let mut routed = 0;
        for record in records {
            if self.process(record)?.is_some() {
                routed += 1;
            }
        }
        Ok(routed)
    }

    /// Get the book for a symbol.
    pub fn book(&self, symbol: &str) -> Option<&B> {
        self.books.get(symbol)
    }

    /// Get the book for a symbol, mutably.
    pub fn book_mut(&mut self, symbol: &str) -> Option<&mut B> {
        self.books.get_mut(symbol)
    }

    /// Iterate over all books.
    pub fn books(&self) -> impl Iterator<Item = (&str, &B)> {
        self.books.iter().map(|(s, b)| (s.as_str(), b))
    }

    /// Reset the book for a specific symbol.
    pub fn reset_symbol(&mut self, symbol: &str) -> Result<()> {
        let book = self
            .books
            .get_mut(symbol)
            .ok_or_else(|| BookError::SymbolNotFound(symbol.to_string()))?;
        book.reset();
        Ok(())
    }

    /// Stop tracking a symbol.
    pub fn remove_symbol(&mut self, symbol: &str) -> Result<()> {
        if self.books.remove(symbol).is_none() {
            return Err(BookError::SymbolNotFound(symbol.to_string()));
        }
        self.stats.remove(symbol);
        Ok(())
    }

    /// Reset all books and statistics.
    pub fn reset_all(&mut self) {
        for book in self.books.values_mut() {
            book.reset();
        }
        for stats in self.stats.values_mut() {
            *stats = SymbolStats::default();
        }
        self.total_messages = 0;
    }

    /// Tracked symbols, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.books.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    pub fn symbol_count(&self) -> usize {
        self.books.len()
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.books.contains_key(symbol)
    }

    /// Get statistics for a specific symbol.
    pub fn symbol_stats(&self, symbol: &str) -> Result<&SymbolStats> {
        self.stats
            .get(symbol)
            .ok_or_else(|| BookError::SymbolNotFound(symbol.to_string()))
    }

    /// Records routed across all symbols.
    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub fn warnings(&self) -> &WarningTracker {
        &self.warnings
    }
}
