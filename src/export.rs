//! Metrics writers: CSV and JSON Lines, single file or one file per symbol.
//!
//! CSV numbers use 15 significant digits in the shortest of fixed or
//! scientific notation, so files line up with what the collector produced.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{BookError, Result};
use crate::metrics::{OrderLevelMetrics, PriceLevelMetrics};

/// Significant digits used for CSV floats.
pub const CSV_PRECISION: usize = 15;

/// Format like C's `%.15g`: 15 significant digits, trailing zeros trimmed,
/// scientific notation for very large or very small magnitudes.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let sci = format!("{:.*e}", CSV_PRECISION - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= CSV_PRECISION as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (CSV_PRECISION as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

/// Quote a CSV field holding a separator, a quote or a line break.
/// Embedded quotes are doubled.
pub fn csv_field(text: &str) -> Cow<'_, str> {
    if text.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(text)
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

// ============================================================================
// CSV rows
// ============================================================================

/// A metrics value with a fixed CSV layout.
pub trait CsvRecord {
    /// Header line, without trailing newline.
    fn header() -> &'static str;

    /// Append one row, without trailing newline.
    fn write_row(&self, out: &mut String);
}

const PRICE_LEVEL_HEADER: &str = "timestamp,symbol,\
best_bid,best_bid_qty,best_ask,best_ask_qty,spread,spread_bps,mid_price,\
bid_volume_top10,ask_volume_top10,imbalance,\
depth_10_bps,depth_25_bps,depth_50_bps";

const ORDER_LEVEL_HEADER: &str = "timestamp,symbol,\
best_bid,best_bid_qty,best_ask,best_ask_qty,spread,spread_bps,mid_price,\
bid_volume_top10,ask_volume_top10,imbalance,\
depth_10_bps,depth_25_bps,depth_50_bps,\
bid_order_count,ask_order_count,\
bid_orders_at_best,ask_orders_at_best,\
avg_bid_order_size,avg_ask_order_size,\
add_events,modify_events,delete_events,orphan_events,\
order_arrival_rate,order_cancel_rate";

impl CsvRecord for PriceLevelMetrics {
    fn header() -> &'static str {
        PRICE_LEVEL_HEADER
    }

    fn write_row(&self, out: &mut String) {
        out.push_str(&csv_field(&self.timestamp));
        out.push(',');
        out.push_str(&csv_field(&self.symbol));
        for value in [
            self.best_bid,
            self.best_bid_qty,
            self.best_ask,
            self.best_ask_qty,
            self.spread,
            self.spread_bps,
            self.mid_price,
            self.bid_volume_top10,
            self.ask_volume_top10,
            self.imbalance,
            self.depth_10_bps,
            self.depth_25_bps,
            self.depth_50_bps,
        ] {
            out.push(',');
            out.push_str(&format_float(value));
        }
    }
}

impl CsvRecord for OrderLevelMetrics {
    fn header() -> &'static str {
        ORDER_LEVEL_HEADER
    }

    fn write_row(&self, out: &mut String) {
        self.book.write_row(out);
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            ",{},{},{},{},{},{},{},{},{},{},{},{}",
            self.bid_order_count,
            self.ask_order_count,
            self.bid_orders_at_best,
            self.ask_orders_at_best,
            format_float(self.avg_bid_order_size),
            format_float(self.avg_ask_order_size),
            self.add_events,
            self.modify_events,
            self.delete_events,
            self.orphan_events,
            format_float(self.order_arrival_rate),
            format_float(self.order_cancel_rate),
        );
    }
}

// ============================================================================
// Writers
// ============================================================================

/// CSV writer; the header goes out with the first row.
pub struct CsvWriter<W: Write> {
    out: W,
    header_written: bool,
    rows: u64,
    line: String,
}

impl CsvWriter<BufWriter<File>> {
    /// Create (truncate) a CSV file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(create_file(path.as_ref())?)))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
            rows: 0,
            line: String::with_capacity(512),
        }
    }

    /// Write one row, preceded by the header on first use.
    pub fn write<M: CsvRecord>(&mut self, metrics: &M) -> Result<()> {
        if !self.header_written {
            writeln!(self.out, "{}", M::header())?;
            self.header_written = true;
        }
        self.line.clear();
        metrics.write_row(&mut self.line);
        self.line.push('\n');
        self.out.write_all(self.line.as_bytes())?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Rows written so far, header excluded.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// JSON Lines writer: one serialized value per line.
pub struct JsonlWriter<W: Write> {
    out: W,
    rows: u64,
}

impl JsonlWriter<BufWriter<File>> {
    /// Create (truncate) a JSON Lines file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(create_file(path.as_ref())?)))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, rows: 0 }
    }

    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        self.out.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn create_file(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| BookError::Io(format!("{}: {}", path.display(), e)))
}

// ============================================================================
// Output selection
// ============================================================================

/// Output encoding for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Jsonl,
}

impl OutputFormat {
    /// Parse `csv` or `jsonl`.
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "csv" => Some(OutputFormat::Csv),
            "jsonl" | "json" => Some(OutputFormat::Jsonl),
            _ => None,
        }
    }
}

/// A metrics file in either format.
pub enum MetricsWriter<W: Write> {
    Csv(CsvWriter<W>),
    Jsonl(JsonlWriter<W>),
}

impl MetricsWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, format: OutputFormat) -> Result<Self> {
        Ok(match format {
            OutputFormat::Csv => MetricsWriter::Csv(CsvWriter::create(path)?),
            OutputFormat::Jsonl => MetricsWriter::Jsonl(JsonlWriter::create(path)?),
        })
    }
}

impl<W: Write> MetricsWriter<W> {
    pub fn write<M: CsvRecord + Serialize>(&mut self, metrics: &M) -> Result<()> {
        match self {
            MetricsWriter::Csv(w) => w.write(metrics),
            MetricsWriter::Jsonl(w) => w.write(metrics),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            MetricsWriter::Csv(w) => w.flush(),
            MetricsWriter::Jsonl(w) => w.flush(),
        }
    }

    pub fn rows_written(&self) -> u64 {
        match self {
            MetricsWriter::Csv(w) => w.rows_written(),
            MetricsWriter::Jsonl(w) => w.rows_written(),
        }
    }
}

/// Replace everything but ASCII alphanumerics and `-` with `_`.
pub fn sanitize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// `out/metrics.csv` + `BTC/USD` -> `out/metrics_BTC_USD.csv`.
pub fn symbol_file_path(base: impl AsRef<Path>, symbol: &str) -> PathBuf {
    let base = base.as_ref();
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{}_{}", stem, sanitize_symbol(symbol));
    if let Some(ext) = base.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    base.with_file_name(name)
}

/// One metrics file per symbol, opened on first write.
pub struct PerSymbolWriter {
    base: PathBuf,
    format: OutputFormat,
    writers: IndexMap<String, MetricsWriter<BufWriter<File>>>,
}

impl PerSymbolWriter {
    pub fn new(base: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            base: base.into(),
            format,
            writers: IndexMap::new(),
        }
    }

    pub fn write<M: CsvRecord + Serialize>(&mut self, symbol: &str, metrics: &M) -> Result<()> {
        if !self.writers.contains_key(symbol) {
            let path = symbol_file_path(&self.base, symbol);
            log::info!("Writing {} metrics to {}", symbol, path.display());
            let writer = MetricsWriter::create(&path, self.format)?;
            self.writers.insert(symbol.to_string(), writer);
        }
        match self.writers.get_mut(symbol) {
            Some(writer) => writer.write(metrics),
            None => Err(BookError::SymbolNotFound(symbol.to_string())),
        }
    }

    pub fn flush_all(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Files opened so far, in creation order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.writers
            .keys()
            .map(|symbol| symbol_file_path(&self.base, symbol))
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.writers.len()
    }

    pub fn rows_written(&self) -> u64 {
        self.writers.values().map(MetricsWriter::rows_written).sum()
    }
}
