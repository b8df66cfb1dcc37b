//! Interval sampling driven by record timestamps.
//!
//! Time comes from the data, never from the wall clock: each symbol's first
//! record schedules its first sample one interval later, and every record
//! whose timestamp reaches the schedule triggers a sample and advances the
//! schedule by exactly one interval.

use std::time::Duration;

use ahash::AHashMap;
use chrono::{DateTime, NaiveDateTime};

use crate::error::{BookError, Result};

/// Parse an interval such as `500ms`, `5s`, `1m` or `1h`.
pub fn parse_interval(text: &str) -> Result<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| BookError::InvalidInterval(text.to_string()))?;
    if split == 0 {
        return Err(BookError::InvalidInterval(text.to_string()));
    }

    let (digits, unit) = text.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| BookError::InvalidInterval(text.to_string()))?;
    if value == 0 {
        return Err(BookError::InvalidInterval(text.to_string()));
    }

    let interval = match unit {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 3600),
        _ => return Err(BookError::InvalidInterval(text.to_string())),
    };
    Ok(interval)
}

/// Parse a record timestamp into Unix epoch seconds.
///
/// Accepts RFC 3339 (`2024-01-01T00:00:00.123Z`) and the collector format
/// `2024-01-01 00:00:00.123`, which is taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(epoch_seconds(dt.timestamp(), dt.timestamp_subsec_nanos()));
    }

    [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| {
            let dt = naive.and_utc();
            epoch_seconds(dt.timestamp(), dt.timestamp_subsec_nanos())
        })
}

#[inline]
fn epoch_seconds(secs: i64, nanos: u32) -> f64 {
    secs as f64 + f64::from(nanos) / 1e9
}

/// Per-symbol sampling schedule.
#[derive(Debug, Clone)]
pub struct IntervalSampler {
    interval: Duration,

    /// symbol -> epoch seconds of the next sample
    next_due: AHashMap<String, f64>,

    samples_taken: u64,
}

impl IntervalSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: AHashMap::new(),
            samples_taken: 0,
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn interval_secs(&self) -> f64 {
        self.interval.as_secs_f64()
    }

    /// Observe a record for `symbol` at `now` (epoch seconds).
    ///
    /// Returns true if a sample is due. The first observation of a symbol only
    /// schedules its first sample.
    pub fn poll(&mut self, symbol: &str, now: f64) -> bool {
        let step = self.interval_secs();
        let due = match self.next_due.get_mut(symbol) {
            Some(due) => due,
            None => {
                self.next_due.insert(symbol.to_string(), now + step);
                return false;
            }
        };

        if now >= *due {
            *due += step;
            self.samples_taken += 1;
            true
        } else {
            false
        }
    }

    /// Next scheduled sample time for `symbol`.
    pub fn next_due(&self, symbol: &str) -> Option<f64> {
        self.next_due.get(symbol).copied()
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples_taken
    }

    /// Forget all schedules.
    pub fn reset(&mut self) {
        self.next_due.clear();
        self.samples_taken = 0;
    }
}
