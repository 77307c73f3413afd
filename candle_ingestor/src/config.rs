//! Run configuration.
//!
//! Everything a run needs is read once from a TOML file into an immutable
//! [`IngestorConfig`], which is then passed by reference to the fetcher.

use std::{
    fs,
    num::NonZeroU32,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tracing::{error, warn};

use crate::{
    errors::Error,
    models::{candle::parse_open_time, timeframe::TimeFrame},
    providers::bybit_rest::Category,
};

pub const DEFAULT_BASE_URL: &str = "https://api.bybit.com";

/// Which persistence adapter receives the fetched rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Csv,
}

impl FromStr for OutputMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputMode::Csv),
            "excel" | "sheet" => Err(Error::Config(format!(
                "output mode '{value}' is not supported, use 'csv'"
            ))),
            _ => Err(Error::Config(format!(
                "invalid output mode '{value}', expected 'csv'"
            ))),
        }
    }
}

/// What to do when a page comes back empty while the start time is not yet in the future.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyPagePolicy {
    /// Stop paginating and persist what has been fetched so far.
    #[default]
    Terminate,
    /// Move the start time forward by exactly one interval and keep going.
    SkipInterval,
}

/// Settings of the exchange client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub category: Category,
    pub requests_per_second: NonZeroU32,
    pub request_timeout_secs: u64,
    /// Fail at startup when `BYBIT_API_KEY`/`BYBIT_API_SECRET` are absent.
    pub require_credentials: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            category: Category::default(),
            requests_per_second: nonzero!(10u32),
            request_timeout_secs: 30,
            require_credentials: false,
        }
    }
}

/// The file as written by the user, before validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    symbol: String,
    interval: String,
    interval_ms: i64,
    start_time: String,
    page_limit: u32,
    output_mode: String,
    #[serde(default)]
    output_path: Option<PathBuf>,
    #[serde(default)]
    empty_page: EmptyPagePolicy,
    #[serde(default)]
    max_pages: Option<usize>,
    #[serde(default)]
    exchange: ExchangeConfig,
}

/// Validated, immutable configuration of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestorConfig {
    pub symbol: String,
    /// Interval label handed to the exchange.
    pub interval: String,
    /// Duration of one bar. Must agree with `interval`; it is never derived from it.
    pub interval_ms: i64,
    /// Initial resume point, used only when the store is empty.
    pub start_time_ms: i64,
    pub page_limit: u32,
    pub output_mode: OutputMode,
    pub output_path: PathBuf,
    pub empty_page: EmptyPagePolicy,
    /// Stop after this many pages even if not caught up.
    pub max_pages: Option<usize>,
    /// Stop requesting pages once the clock passes this instant.
    pub deadline: Option<DateTime<Utc>>,
    pub exchange: ExchangeConfig,
}

impl IngestorConfig {
    /// Reads and validates the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            error!("Failed to read config file {}: {e}", path.display());
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        Self::try_from(raw)
    }

    /// Overrides the page cap, e.g. from the command line.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        if max_pages.is_some() {
            self.max_pages = max_pages;
        }
        self
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Default store name: `3m` becomes `3min_data.csv`, `1h` becomes `1h_data.csv`.
pub fn default_output_path(interval: &str) -> PathBuf {
    if interval.contains('m') {
        PathBuf::from(format!("{interval}in_data.csv"))
    } else {
        PathBuf::from(format!("{interval}_data.csv"))
    }
}

impl TryFrom<RawConfig> for IngestorConfig {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        // Checked first so a bad mode fails before anything else is looked at.
        let output_mode: OutputMode = raw.output_mode.parse()?;

        if raw.symbol.trim().is_empty() {
            return Err(Error::Config("symbol must not be empty".into()));
        }
        if raw.interval.trim().is_empty() {
            return Err(Error::Config("interval must not be empty".into()));
        }
        if raw.interval_ms <= 0 {
            return Err(Error::Config(format!(
                "interval_ms must be positive, got {}",
                raw.interval_ms
            )));
        }
        if raw.page_limit == 0 {
            return Err(Error::Config("page_limit must be at least 1".into()));
        }
        if raw.max_pages == Some(0) {
            return Err(Error::Config("max_pages must be at least 1".into()));
        }

        let start_time_ms = parse_open_time(&raw.start_time).map_err(|e| {
            Error::Config(format!(
                "start_time '{}' is not 'YYYY-MM-DD HH:MM:SS': {e}",
                raw.start_time
            ))
        })?;

        let window_fits = i64::from(raw.page_limit)
            .checked_mul(raw.interval_ms)
            .and_then(|span| start_time_ms.checked_add(span))
            .is_some();
        if !window_fits {
            return Err(Error::Config(format!(
                "page_limit {} x interval_ms {} from start_time overflows the timestamp range",
                raw.page_limit, raw.interval_ms
            )));
        }

        if let Ok(timeframe) = raw.interval.parse::<TimeFrame>() {
            if let Some(expected) = timeframe.duration_ms() {
                if expected != raw.interval_ms {
                    warn!(
                        interval = %raw.interval,
                        interval_ms = raw.interval_ms,
                        expected,
                        "interval_ms does not match the interval label; rows may overlap or leave gaps"
                    );
                }
            }
        }

        let output_path = raw
            .output_path
            .unwrap_or_else(|| default_output_path(&raw.interval));

        Ok(Self {
            symbol: raw.symbol,
            interval: raw.interval,
            interval_ms: raw.interval_ms,
            start_time_ms,
            page_limit: raw.page_limit,
            output_mode,
            output_path,
            empty_page: raw.empty_page,
            max_pages: raw.max_pages,
            deadline: None,
            exchange: raw.exchange,
        })
    }
}
