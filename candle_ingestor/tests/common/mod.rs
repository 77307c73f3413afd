#![allow(dead_code)]

use std::{
    path::Path,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use candle_ingestor::{
    IngestorConfig,
    models::{candle::Candle, request_params::CandleRequest},
    providers::{DataProvider, ProviderError, errors::ApiSnafu},
};
use chrono::{TimeZone, Utc};

pub const INTERVAL_MS: i64 = 180_000;

/// Epoch millis of `2022-12-31 hh:mm:00` UTC.
pub fn at(hour: u32, minute: u32) -> i64 {
    Utc.with_ymd_and_hms(2022, 12, 31, hour, minute, 0)
        .unwrap()
        .timestamp_millis()
}

pub fn config(output: &Path, page_limit: u32, extra: &str) -> IngestorConfig {
    config_with(output, "3m", INTERVAL_MS, page_limit, extra)
}

pub fn config_with(
    output: &Path,
    interval: &str,
    interval_ms: i64,
    page_limit: u32,
    extra: &str,
) -> IngestorConfig {
    IngestorConfig::from_toml_str(&format!(
        r#"
        symbol = "BTCUSD"
        interval = "{interval}"
        interval_ms = {interval_ms}
        start_time = "2022-12-31 01:00:00"
        page_limit = {page_limit}
        output_mode = "csv"
        output_path = "{}"
        {extra}
        "#,
        output.display()
    ))
    .unwrap()
}

pub fn candle(open_time_ms: i64) -> Candle {
    let base = (open_time_ms / INTERVAL_MS % 1000) as f64;
    Candle {
        open_time_ms,
        open: 16_500.0 + base,
        high: 16_510.5 + base,
        low: 16_490.25 + base,
        close: 16_505.0 + base,
        volume: 1_000.0 + base,
    }
}

/// An exchange holding one bar per interval at the given open times.
pub struct GridProvider {
    bars: Vec<i64>,
    calls: Mutex<Vec<i64>>,
}

impl GridProvider {
    /// Bars every interval from `first` to `last`, both inclusive.
    pub fn continuous(first: i64, last: i64) -> Self {
        Self::with_bars((first..=last).step_by(INTERVAL_MS as usize).collect())
    }

    pub fn with_bars(mut bars: Vec<i64>) -> Self {
        bars.sort_unstable();
        Self {
            bars,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `since_ms` of every request received.
    pub fn calls(&self) -> Vec<i64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataProvider for GridProvider {
    async fn fetch_candles(&self, request: CandleRequest) -> Result<Vec<Candle>, ProviderError> {
        self.calls.lock().unwrap().push(request.since_ms);
        let end = request.window_end_ms().unwrap();
        Ok(self
            .bars
            .iter()
            .copied()
            .filter(|t| *t >= request.since_ms && *t <= end)
            .take(request.limit as usize)
            .map(candle)
            .collect())
    }
}

/// Fails every request the way a rate-limited exchange would.
#[derive(Default)]
pub struct FailingProvider {
    pub calls: AtomicUsize,
}

#[async_trait]
impl DataProvider for FailingProvider {
    async fn fetch_candles(&self, _request: CandleRequest) -> Result<Vec<Candle>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ApiSnafu {
            message: "code 10006: Too many visits!",
        }
        .fail()
    }
}

/// Never answers.
pub struct HangingProvider;

#[async_trait]
impl DataProvider for HangingProvider {
    async fn fetch_candles(&self, _request: CandleRequest) -> Result<Vec<Candle>, ProviderError> {
        std::future::pending().await
    }
}

/// Data rows of a CSV store, header excluded.
pub fn data_rows(path: &Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.records().map(|r| r.unwrap()).collect()
}
