//! Warning and issue tracking for book reconstruction.
//!
//! Feed anomalies never abort processing: they are categorized, attached to
//! the symbol and data timestamp they came from, and kept for later export.
//! Storage is bounded by [`WarningTrackerConfig::max_warnings`]; counts keep
//! growing past the bound so summaries stay exact.
//!
//! # Example
//!
//! ```
//! use crypto_book_reconstructor::warnings::{WarningCategory, WarningTracker};
//!
//! let mut tracker = WarningTracker::new();
//! tracker.record_simple(WarningCategory::OrphanEvent, "BTC/USD", "delete for unknown order OABC");
//!
//! let summary = tracker.summary();
//! assert_eq!(summary.total, 1);
//! assert_eq!(summary.by_category.get("ORPHAN_EVENT"), Some(&1));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::export::csv_field;

/// Category of warning for classification and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningCategory {
    /// Modify/delete for an order id the book does not hold
    OrphanEvent,

    /// Local book diverged from the exchange checksum
    ChecksumMismatch,

    /// Malformed level or order line (bad price, quantity, or event)
    InvalidInput,

    /// Update received before the first snapshot of a symbol
    UninitializedUpdate,

    /// Best bid at or above best ask after applying a record
    CrossedBook,

    /// Add for an order id that was already resting
    DuplicateOrder,
}

impl WarningCategory {
    /// Get a human-readable name for the category.
    pub fn name(&self) -> &'static str {
        match self {
            WarningCategory::OrphanEvent => "ORPHAN_EVENT",
            WarningCategory::ChecksumMismatch => "CHECKSUM_MISMATCH",
            WarningCategory::InvalidInput => "INVALID_INPUT",
            WarningCategory::UninitializedUpdate => "UNINITIALIZED_UPDATE",
            WarningCategory::CrossedBook => "CROSSED_BOOK",
            WarningCategory::DuplicateOrder => "DUPLICATE_ORDER",
        }
    }

    /// Get severity level (1=low, 2=medium, 3=high).
    pub fn severity(&self) -> u8 {
        match self {
            WarningCategory::OrphanEvent => 1,
            WarningCategory::DuplicateOrder => 1,
            WarningCategory::InvalidInput => 2,
            WarningCategory::UninitializedUpdate => 2,
            WarningCategory::CrossedBook => 3,
            WarningCategory::ChecksumMismatch => 3,
        }
    }
}

/// A single warning record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    /// Unique warning ID (auto-incremented)
    pub id: u64,

    pub category: WarningCategory,

    /// Symbol whose book raised the warning
    pub symbol: String,

    /// Human-readable message
    pub message: String,

    /// Timestamp of the record that triggered the warning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_timestamp: Option<String>,

    /// Related order ID (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    /// Additional context as key-value pairs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl Warning {
    /// Create a new warning with minimal information.
    pub fn new(
        id: u64,
        category: WarningCategory,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            category,
            symbol: symbol.into(),
            message: message.into(),
            data_timestamp: None,
            order_id: None,
            context: BTreeMap::new(),
        }
    }

    /// Set the data timestamp.
    pub fn with_data_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.data_timestamp = Some(timestamp.into());
        self
    }

    /// Set the order ID.
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Add context key-value pair.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

/// Summary statistics for warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarningSummary {
    /// Total number of warnings, including those past the storage bound
    pub total: u64,

    /// Count by category name
    pub by_category: BTreeMap<String, u64>,

    /// Count by severity
    pub by_severity: BTreeMap<u8, u64>,

    /// Count by symbol
    pub by_symbol: BTreeMap<String, u64>,

    /// First stored warning's data timestamp
    pub first_timestamp: Option<String>,

    /// Last stored warning's data timestamp
    pub last_timestamp: Option<String>,

    /// Number of distinct order IDs among stored warnings
    pub unique_orders: u64,
}

/// Configuration for warning tracker.
#[derive(Debug, Clone)]
pub struct WarningTrackerConfig {
    /// Maximum number of warnings to keep in memory
    pub max_warnings: usize,
}

impl Default for WarningTrackerConfig {
    fn default() -> Self {
        Self {
            max_warnings: 100_000,
        }
    }
}

impl WarningTrackerConfig {
    pub fn with_max_warnings(mut self, max_warnings: usize) -> Self {
        self.max_warnings = max_warnings;
        self
    }
}

/// Bounded, categorized warning store.
#[derive(Debug, Clone)]
pub struct WarningTracker {
    config: WarningTrackerConfig,

    /// Stored warnings, oldest first
    warnings: Vec<Warning>,

    next_id: u64,

    category_counts: AHashMap<WarningCategory, u64>,
    symbol_counts: AHashMap<String, u64>,
}

impl WarningTracker {
    /// Create a new warning tracker with default configuration.
    pub fn new() -> Self {
        Self::with_config(WarningTrackerConfig::default())
    }

    /// Create a new warning tracker with custom configuration.
    pub fn with_config(config: WarningTrackerConfig) -> Self {
        Self {
            config,
            warnings: Vec::new(),
            next_id: 1,
            category_counts: AHashMap::new(),
            symbol_counts: AHashMap::new(),
        }
    }

    /// Next unused warning id.
    #[inline]
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Record a warning, returning its id.
    ///
    /// The warning is counted even when storage is full.
    pub fn record(&mut self, warning: Warning) -> u64 {
        *self.category_counts.entry(warning.category).or_insert(0) += 1;
        match self.symbol_counts.get_mut(&warning.symbol) {
            Some(count) => *count += 1,
            None => {
                self.symbol_counts.insert(warning.symbol.clone(), 1);
            }
        }

        let id = warning.id;
        if self.warnings.len() < self.config.max_warnings {
            self.warnings.push(warning);
        }
        id
    }

    /// Record a warning with just category, symbol and message.
    pub fn record_simple(
        &mut self,
        category: WarningCategory,
        symbol: &str,
        message: impl Into<String>,
    ) -> u64 {
        let id = self.next_id();
        self.record(Warning::new(id, category, symbol, message))
    }

    /// Record a warning with order context.
    pub fn record_order_warning(
        &mut self,
        category: WarningCategory,
        symbol: &str,
        message: impl Into<String>,
        order_id: &str,
        timestamp: Option<&str>,
    ) -> u64 {
        let id = self.next_id();
        let mut warning = Warning::new(id, category, symbol, message).with_order_id(order_id);
        if let Some(ts) = timestamp {
            warning = warning.with_data_timestamp(ts);
        }
        self.record(warning)
    }

    /// Number of stored warnings.
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Total count including warnings past the storage bound.
    pub fn total_count(&self) -> u64 {
        self.category_counts.values().sum()
    }

    /// Get count for a specific category.
    pub fn count_by_category(&self, category: WarningCategory) -> u64 {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }

    /// Get all stored warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Get stored warnings by category.
    pub fn warnings_by_category(&self, category: WarningCategory) -> Vec<&Warning> {
        self.warnings
            .iter()
            .filter(|w| w.category == category)
            .collect()
    }

    /// Get summary statistics.
    pub fn summary(&self) -> WarningSummary {
        let mut by_category = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        for (category, &count) in &self.category_counts {
            by_category.insert(category.name().to_string(), count);
            *by_severity.entry(category.severity()).or_insert(0) += count;
        }

        let by_symbol = self
            .symbol_counts
            .iter()
            .map(|(symbol, &count)| (symbol.clone(), count))
            .collect();

        let unique_orders = self
            .warnings
            .iter()
            .filter_map(|w| w.order_id.as_deref())
            .collect::<BTreeSet<_>>()
            .len() as u64;

        WarningSummary {
            total: self.total_count(),
            by_category,
            by_severity,
            by_symbol,
            first_timestamp: self.warnings.first().and_then(|w| w.data_timestamp.clone()),
            last_timestamp: self.warnings.last().and_then(|w| w.data_timestamp.clone()),
            unique_orders,
        }
    }

    /// Write stored warnings as JSON Lines, one warning per line.
    pub fn export_jsonl<W: Write>(&self, mut writer: W) -> Result<()> {
        for warning in &self.warnings {
            serde_json::to_writer(&mut writer, warning)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write stored warnings as CSV (for spreadsheet analysis).
    pub fn export_csv<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(
            writer,
            "id,category,severity,symbol,message,data_timestamp,order_id"
        )?;
        for warning in &self.warnings {
            writeln!(
                writer,
                "{},{},{},{},{},{},{}",
                warning.id,
                warning.category.name(),
                warning.category.severity(),
                csv_field(&warning.symbol),
                csv_field(&warning.message),
                csv_field(warning.data_timestamp.as_deref().unwrap_or_default()),
                csv_field(warning.order_id.as_deref().unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Clear all warnings and counts.
    pub fn clear(&mut self) {
        self.warnings.clear();
        self.category_counts.clear();
        self.symbol_counts.clear();
    }
}

impl Default for WarningTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_category_names() {
        assert_eq!(WarningCategory::OrphanEvent.name(), "ORPHAN_EVENT");
        assert_eq!(WarningCategory::ChecksumMismatch.name(), "CHECKSUM_MISMATCH");
    }

    #[test]
    fn test_warning_category_severity() {
        assert_eq!(WarningCategory::OrphanEvent.severity(), 1);
        assert_eq!(WarningCategory::CrossedBook.severity(), 3);
    }

    #[test]
    fn test_warning_creation() {
        let warning = Warning::new(1, WarningCategory::OrphanEvent, "BTC/USD", "Test message")
            .with_order_id("OABC")
            .with_data_timestamp("2024-01-01 00:00:00.000")
            .with_context("event", "delete");

        assert_eq!(warning.id, 1);
        assert_eq!(warning.symbol, "BTC/USD");
        assert_eq!(warning.order_id.as_deref(), Some("OABC"));
        assert_eq!(warning.context.get("event").map(String::as_str), Some("delete"));
    }

    #[test]
    fn test_warning_tracker_basic() {
        let mut tracker = WarningTracker::new();

        let first = tracker.record_simple(WarningCategory::OrphanEvent, "BTC/USD", "a");
        let second = tracker.record_simple(WarningCategory::OrphanEvent, "ETH/USD", "b");
        tracker.record_simple(WarningCategory::CrossedBook, "BTC/USD", "crossed");

        assert_eq!((first, second), (1, 2));
        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.count_by_category(WarningCategory::OrphanEvent), 2);
        assert_eq!(tracker.count_by_category(WarningCategory::InvalidInput), 0);
        assert_eq!(tracker.warnings_by_category(WarningCategory::CrossedBook).len(), 1);
    }

    #[test]
    fn test_storage_bound_keeps_counting() {
        let config = WarningTrackerConfig::default().with_max_warnings(2);
        let mut tracker = WarningTracker::with_config(config);

        for i in 0..5 {
            tracker.record_simple(WarningCategory::InvalidInput, "BTC/USD", format!("bad {i}"));
        }

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.total_count(), 5);
        assert_eq!(tracker.summary().by_symbol.get("BTC/USD"), Some(&5));
    }

    #[test]
    fn test_warning_tracker_summary() {
        let mut tracker = WarningTracker::new();

        tracker.record_order_warning(
            WarningCategory::OrphanEvent,
            "BTC/USD",
            "modify for unknown order",
            "O1",
            Some("2024-01-01 00:00:00.000"),
        );
        tracker.record_order_warning(
            WarningCategory::DuplicateOrder,
            "BTC/USD",
            "add replaced resting order",
            "O2",
            Some("2024-01-01 00:00:01.000"),
        );

        let summary = tracker.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.unique_orders, 2);
        assert_eq!(summary.by_severity.get(&1), Some(&2));
        assert_eq!(summary.first_timestamp.as_deref(), Some("2024-01-01 00:00:00.000"));
        assert_eq!(summary.last_timestamp.as_deref(), Some("2024-01-01 00:00:01.000"));
    }

    #[test]
    fn test_export_jsonl() {
        let mut tracker = WarningTracker::new();
        tracker.record_simple(WarningCategory::ChecksumMismatch, "BTC/USD", "mismatch");
        tracker.record_simple(WarningCategory::CrossedBook, "BTC/USD", "crossed");

        let mut out = Vec::new();
        tracker.export_jsonl(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        let first: Warning = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.category, WarningCategory::ChecksumMismatch);
        assert!(!lines[0].contains("order_id"));
    }

    #[test]
    fn test_export_csv() {
        let mut tracker = WarningTracker::new();
        tracker.record_simple(WarningCategory::InvalidInput, "ETH/USD", "bad, level");

        let mut out = Vec::new();
        tracker.export_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("id,category,severity,symbol,message"));
        assert!(text.contains("1,INVALID_INPUT,2,ETH/USD,\"bad, level\",,"));
    }

    #[test]
    fn test_export_csv_quotes_only_when_needed() {
        let mut tracker = WarningTracker::new();
        tracker.record_order_warning(
            WarningCategory::OrphanEvent,
            "BTC/USD",
            "delete for \"O1\"",
            "O1",
            Some("2024-01-01 00:00:00.000"),
        );

        let mut out = Vec::new();
        tracker.export_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let row = text.lines().nth(1).unwrap();

        assert_eq!(
            row,
            "1,ORPHAN_EVENT,1,BTC/USD,\"delete for \"\"O1\"\"\",2024-01-01 00:00:00.000,O1"
        );
    }

    #[test]
    fn test_clear() {
        let mut tracker = WarningTracker::new();
        tracker.record_simple(WarningCategory::OrphanEvent, "BTC/USD", "x");
        tracker.clear();
        assert!(tracker.is_empty());
        assert_eq!(tracker.total_count(), 0);
    }
}
