//! Record sources for the reconstruction engine.
//!
//! A source turns some storage into an ordered stream of normalized records
//! ([`BookRecord`] or [`OrderRecord`]). Books never see the storage format.
//!
//! # Capture format
//!
//! The collector writes one JSON object per line:
//!
//! ```text
//! {"timestamp":"2024-01-01 00:00:00.123","channel":"book","type":"update",
//!  "data":{"symbol":"BTC/USD","bids":[[45283.5,0.01]],"asks":[],"checksum":1037897802}}
//! ```
//!
//! L2 levels are `[price, quantity]` pairs; L3 lines carry `order_id`,
//! `limit_price`, `order_qty`, `timestamp` and, on updates, `event`.
//! Lines from another channel are skipped.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use crypto_book_reconstructor::source::{JsonlSource, RecordSource};
//! use crypto_book_reconstructor::BookRecord;
//!
//! let capture = r#"{"timestamp":"t0","channel":"book","type":"snapshot","data":{"symbol":"BTC/USD","bids":[[100.0,1.0]],"asks":[[101.0,2.0]],"checksum":0}}"#;
//! let source: JsonlSource<_, BookRecord> = JsonlSource::new(Cursor::new(capture));
//!
//! let records: Vec<BookRecord> = source.records().unwrap().collect::<Result<_, _>>().unwrap();
//! assert_eq!(records[0].symbol, "BTC/USD");
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{BookError, Result};
use crate::types::{BookRecord, OrderLine, OrderRecord, PriceLevel, RecordType};

// ============================================================================
// Source Metadata
// ============================================================================

/// Metadata about a record source.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    /// Path to the source file (if file-based)
    pub file_path: Option<PathBuf>,

    /// Provider name (e.g. "jsonl", "memory")
    pub provider: Option<String>,

    /// Number of records, when known up front
    pub estimated_records: Option<u64>,

    /// File size in bytes (if file-based)
    pub file_size: Option<u64>,
}

impl SourceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_path(mut self, path: impl AsRef<Path>) -> Self {
        self.file_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_estimated_records(mut self, count: u64) -> Self {
        self.estimated_records = Some(count);
        self
    }

    /// Metadata for a capture file: path and size.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut metadata = Self::new().with_file_path(path).with_provider("jsonl");
        if let Ok(meta) = std::fs::metadata(path) {
            metadata.file_size = Some(meta.len());
        }
        metadata
    }
}

// ============================================================================
// RecordSource trait
// ============================================================================

/// A stream of decoded records in arrival order.
pub trait RecordSource {
    /// Record type produced
    type Record;

    /// Iterator over decoded records
    type Records: Iterator<Item = Result<Self::Record>>;

    /// Consume the source and return its records.
    fn records(self) -> Result<Self::Records>;

    fn metadata(&self) -> &SourceMetadata;
}

// ============================================================================
// In-memory source
// ============================================================================

/// Records already in memory, mostly for tests and benchmarks.
pub struct VecSource<T> {
    records: Vec<T>,
    metadata: SourceMetadata,
}

impl<T> VecSource<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            metadata: SourceMetadata::new()
                .with_provider("memory")
                .with_estimated_records(records.len() as u64),
            records,
        }
    }

    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl<T> RecordSource for VecSource<T> {
    type Record = T;
    type Records = std::iter::Map<std::vec::IntoIter<T>, fn(T) -> Result<T>>;

    fn records(self) -> Result<Self::Records> {
        Ok(self.records.into_iter().map(Ok as fn(T) -> Result<T>))
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }
}

// ============================================================================
// Capture envelope
// ============================================================================

/// One line of a capture file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "L: Deserialize<'de>"))]
pub struct Envelope<L> {
    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub channel: String,

    #[serde(rename = "type")]
    pub record_type: RecordType,

    pub data: EnvelopeData<L>,
}

/// Payload of a capture line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "L: Deserialize<'de>"))]
pub struct EnvelopeData<L> {
    pub symbol: String,

    #[serde(default)]
    pub bids: Vec<L>,

    #[serde(default)]
    pub asks: Vec<L>,

    #[serde(default)]
    pub checksum: Option<u32>,
}

/// A record that has a capture-file representation.
pub trait CaptureRecord: Sized {
    /// Per-side entry type
    type Line: Serialize + DeserializeOwned;

    /// Channel name in the envelope
    const CHANNEL: &'static str;

    fn from_envelope(envelope: Envelope<Self::Line>) -> Self;

    fn to_envelope(&self) -> Envelope<Self::Line>;
}

impl CaptureRecord for BookRecord {
    type Line = PriceLevel;
    const CHANNEL: &'static str = "book";

    fn from_envelope(envelope: Envelope<PriceLevel>) -> Self {
        Self {
            timestamp: envelope.timestamp,
            symbol: envelope.data.symbol,
            record_type: envelope.record_type,
            bids: envelope.data.bids,
            asks: envelope.data.asks,
            checksum: envelope.data.checksum,
        }
    }

    fn to_envelope(&self) -> Envelope<PriceLevel> {
        Envelope {
            timestamp: self.timestamp.clone(),
            channel: Self::CHANNEL.to_string(),
            record_type: self.record_type,
            data: EnvelopeData {
                symbol: self.symbol.clone(),
                bids: self.bids.clone(),
                asks: self.asks.clone(),
                checksum: self.checksum,
            },
        }
    }
}

impl CaptureRecord for OrderRecord {
    type Line = OrderLine;
    const CHANNEL: &'static str = "level3";

    fn from_envelope(envelope: Envelope<OrderLine>) -> Self {
        Self {
            timestamp: envelope.timestamp,
            symbol: envelope.data.symbol,
            record_type: envelope.record_type,
            bids: envelope.data.bids,
            asks: envelope.data.asks,
            checksum: envelope.data.checksum,
        }
    }

    fn to_envelope(&self) -> Envelope<OrderLine> {
        Envelope {
            timestamp: self.timestamp.clone(),
            channel: Self::CHANNEL.to_string(),
            record_type: self.record_type,
            data: EnvelopeData {
                symbol: self.symbol.clone(),
                bids: self.bids.clone(),
                asks: self.asks.clone(),
                checksum: self.checksum,
            },
        }
    }
}

/// Decode one capture line.
///
/// Returns `Ok(None)` for lines of another channel. `line_no` is only used
/// for error reporting.
pub fn decode_line<T: CaptureRecord>(line: &str, line_no: u64) -> Result<Option<T>> {
    // Payload shapes differ per channel, so look at the channel first.
    let tag: ChannelTag =
        serde_json::from_str(line).map_err(|e| BookError::decode(line_no, e.to_string()))?;
    if !tag.channel.is_empty() && tag.channel != T::CHANNEL {
        log::debug!("line {}: skipping channel {:?}", line_no, tag.channel);
        return Ok(None);
    }

    let envelope: Envelope<T::Line> =
        serde_json::from_str(line).map_err(|e| BookError::decode(line_no, e.to_string()))?;
    Ok(Some(T::from_envelope(envelope)))
}

#[derive(Deserialize)]
struct ChannelTag {
    #[serde(default)]
    channel: String,
}

/// Decode one aggregated-book capture line.
pub fn decode_book_line(line: &str) -> Result<Option<BookRecord>> {
    decode_line(line, 1)
}

/// Decode one order-level capture line.
pub fn decode_order_line(line: &str) -> Result<Option<OrderRecord>> {
    decode_line(line, 1)
}

// ============================================================================
// JSON Lines source
// ============================================================================

/// Capture file reader, one record per line.
pub struct JsonlSource<R, T> {
    reader: R,
    skip_invalid: bool,
    metadata: SourceMetadata,
    _record: PhantomData<fn() -> T>,
}

impl<T: CaptureRecord> JsonlSource<BufReader<File>, T> {
    /// Open a capture file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| BookError::Io(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(BufReader::new(file)).with_metadata(SourceMetadata::from_path(path)))
    }
}

impl<R: BufRead, T: CaptureRecord> JsonlSource<R, T> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            skip_invalid: false,
            metadata: SourceMetadata::new().with_provider("jsonl"),
            _record: PhantomData,
        }
    }

    /// Skip undecodable lines with a warning instead of failing.
    pub fn skip_invalid(mut self, skip: bool) -> Self {
        self.skip_invalid = skip;
        self
    }

    pub fn with_metadata(mut self, metadata: SourceMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl<R: BufRead, T: CaptureRecord> RecordSource for JsonlSource<R, T> {
    type Record = T;
    type Records = JsonlRecords<R, T>;

    fn records(self) -> Result<Self::Records> {
        Ok(JsonlRecords {
            lines: self.reader.lines(),
            line_no: 0,
            skip_invalid: self.skip_invalid,
            skipped: 0,
            _record: PhantomData,
        })
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }
}

/// Iterator returned by [`JsonlSource::records`].
pub struct JsonlRecords<R, T> {
    lines: Lines<R>,
    line_no: u64,
    skip_invalid: bool,
    skipped: u64,
    _record: PhantomData<fn() -> T>,
}

impl<R, T> JsonlRecords<R, T> {
    /// Lines read so far.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    /// Undecodable lines skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: BufRead, T: CaptureRecord> Iterator for JsonlRecords<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            match decode_line::<T>(&line, self.line_no) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) if self.skip_invalid => {
                    log::warn!("Skipping undecodable line: {}", e);
                    self.skipped += 1;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
