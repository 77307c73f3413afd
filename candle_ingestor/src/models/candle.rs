//! Canonical in-memory representation of a candle (OHLCV) and its on-disk row.
//!
//! [`Candle`] is what every [`DataProvider`](crate::providers::DataProvider)
//! returns; [`CandleRecord`] is the normalized row written to the store.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Layout of the human-readable `open_time` column.
pub const OPEN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header row of the CSV store, in column order.
pub const CSV_HEADER: [&str; 6] = ["open_time", "Open", "High", "Low", "Close", "Volume"];

/// A single OHLCV observation as delivered by the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    /// Bar open time, epoch milliseconds.
    pub open_time_ms: i64,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Volume traded during the bar interval.
    pub volume: f64,
}

impl Candle {
    /// The bar open time as a UTC timestamp, `None` if out of chrono's range.
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time_ms)
    }
}

/// One normalized row of the output store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleRecord {
    #[serde(rename = "open_time")]
    pub open_time: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
}

impl CandleRecord {
    /// Builds the output row for `candle` given its already-converted open time.
    pub fn new(candle: &Candle, open_time: DateTime<Utc>) -> Self {
        Self {
            open_time: format_open_time(open_time),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
        }
    }
}

/// Renders a timestamp the way the store's `open_time` column holds it.
pub fn format_open_time(time: DateTime<Utc>) -> String {
    time.format(OPEN_TIME_FORMAT).to_string()
}

/// Parses an `open_time` column value (UTC) back into epoch milliseconds.
pub fn parse_open_time(value: &str) -> Result<i64, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value.trim(), OPEN_TIME_FORMAT)
        .map(|naive| naive.and_utc().timestamp_millis())
}
