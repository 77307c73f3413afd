//! Incremental candle fetching.
//!
//! A run resumes where the store ends, requests pages one after another
//! (each page starts one interval after the newest bar of the previous one)
//! until the next start lies in the future, then writes everything in one
//! bulk append. Nothing is written if the loop fails or is cancelled.

use chrono::DateTime;
use tracing::{info, instrument, warn};

use crate::{
    config::{EmptyPagePolicy, IngestorConfig},
    errors::Error,
    io::{
        checkpoint::Checkpoint,
        sink::{CandleStore, StoredResume},
    },
    models::{
        candle::{Candle, CandleRecord, format_open_time, parse_open_time},
        request_params::CandleRequest,
    },
    providers::{DataProvider, errors::DecodeSnafu},
    utils::{
        clock::{Clock, SystemClock},
        shutdown::Shutdown,
    },
};

/// Why the pagination loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The next start time is later than now.
    CaughtUp,
    /// A page came back empty under [`EmptyPagePolicy::Terminate`].
    EmptyPage,
    /// `max_pages` requests were made.
    PageLimit,
    /// The configured deadline passed.
    Deadline,
}

/// Everything the pagination loop collected.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// All rows, in fetch order.
    pub candles: Vec<Candle>,
    /// Number of requests made, empty pages included.
    pub requests: usize,
    /// Working start time when the loop stopped.
    pub next_start_ms: i64,
    /// Condition that ended the loop.
    pub stop: StopReason,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub resumed_from_ms: i64,
    pub requests: usize,
    pub rows_written: usize,
    /// Where the next run will start.
    pub next_start_ms: i64,
    pub stop: StopReason,
}

fn readable(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(format_open_time)
        .unwrap_or_else(|| ms.to_string())
}

/// Converts fetched candles to store rows, preserving order.
pub fn normalize(candles: &[Candle]) -> Result<Vec<CandleRecord>, Error> {
    candles
        .iter()
        .map(|candle| {
            let open_time = candle.open_time().ok_or_else(|| {
                DecodeSnafu {
                    field: "start_time",
                    value: candle.open_time_ms.to_string(),
                }
                .build()
            })?;
            Ok(CandleRecord::new(candle, open_time))
        })
        .collect()
}

pub struct IncrementalFetcher<'a, P, C = SystemClock> {
    config: &'a IngestorConfig,
    provider: P,
    clock: C,
}

impl<'a, P> IncrementalFetcher<'a, P, SystemClock>
where
    P: DataProvider,
{
    pub fn new(config: &'a IngestorConfig, provider: P) -> Self {
        Self::with_clock(config, provider, SystemClock)
    }
}

impl<'a, P, C> IncrementalFetcher<'a, P, C>
where
    P: DataProvider,
    C: Clock,
{
    pub fn with_clock(config: &'a IngestorConfig, provider: P, clock: C) -> Self {
        Self {
            config,
            provider,
            clock,
        }
    }

    /// Start time of the first request: one interval after the last stored
    /// row, or the configured start for an empty store.
    pub async fn resume_point<S: CandleStore>(&self, store: &S) -> Result<i64, Error> {
        let start = match store.resume_state().await? {
            StoredResume::Empty => self.config.start_time_ms,
            StoredResume::Checkpoint(checkpoint) if self.checkpoint_applies(&checkpoint) => {
                checkpoint.next_start_ms
            }
            StoredResume::Checkpoint(checkpoint) => {
                warn!(
                    symbol = %checkpoint.symbol,
                    interval = %checkpoint.interval,
                    interval_ms = checkpoint.interval_ms,
                    "checkpoint was written with other settings, resuming from the last row"
                );
                self.after_stored(&checkpoint.last_open_time)?
            }
            StoredResume::LastRow { open_time } => self.after_stored(&open_time)?,
        };
        info!("New starting point: {}", readable(start));
        Ok(start)
    }

    fn checkpoint_applies(&self, checkpoint: &Checkpoint) -> bool {
        checkpoint.symbol == self.config.symbol
            && checkpoint.interval == self.config.interval
            && checkpoint.interval_ms == self.config.interval_ms
    }

    /// One interval after `open_time_ms`.
    fn after(&self, open_time_ms: i64) -> Result<i64, Error> {
        open_time_ms.checked_add(self.config.interval_ms).ok_or_else(|| {
            Error::Config(format!(
                "interval_ms {} overflows the timestamp range after {}",
                self.config.interval_ms,
                readable(open_time_ms)
            ))
        })
    }

    fn after_stored(&self, open_time: &str) -> Result<i64, Error> {
        let last = parse_open_time(open_time).map_err(|source| Error::StoreParse {
            value: open_time.to_string(),
            source,
        })?;
        self.after(last)
    }

    /// Requests pages from `start_ms` until caught up with the clock or
    /// another stop condition holds.
    pub async fn fetch_pages(
        &self,
        start_ms: i64,
        shutdown: &mut Shutdown,
    ) -> Result<FetchOutcome, Error> {
        let interval_ms = self.config.interval_ms;
        let mut start_ms = start_ms;
        let mut candles = Vec::new();
        let mut requests = 0usize;

        let stop = loop {
            if shutdown.is_triggered() {
                return Err(Error::Cancelled);
            }

            let now = self.clock.now_ms();
            if start_ms > now {
                info!("current time reached: {}", readable(now));
                break StopReason::CaughtUp;
            }
            if self
                .config
                .deadline
                .is_some_and(|deadline| now >= deadline.timestamp_millis())
            {
                info!("deadline reached after {requests} requests");
                break StopReason::Deadline;
            }
            if self.config.max_pages.is_some_and(|max| requests >= max) {
                info!("page limit reached after {requests} requests");
                break StopReason::PageLimit;
            }

            let request = CandleRequest {
                symbol: self.config.symbol.clone(),
                interval: self.config.interval.clone(),
                interval_ms,
                since_ms: start_ms,
                limit: self.config.page_limit,
            };

            let page = tokio::select! {
                page = self.provider.fetch_candles(request) => page?,
                _ = shutdown.triggered() => return Err(Error::Cancelled),
            };
            requests += 1;

            match page.iter().map(|candle| candle.open_time_ms).max() {
                Some(newest) => {
                    start_ms = self.after(newest)?;
                    candles.extend(page);
                    info!("Current starting time: {}", readable(start_ms));
                }
                None => match self.config.empty_page {
                    EmptyPagePolicy::Terminate => {
                        warn!("empty page at {}, stopping", readable(start_ms));
                        break StopReason::EmptyPage;
                    }
                    EmptyPagePolicy::SkipInterval => {
                        warn!("empty page at {}, skipping one interval", readable(start_ms));
                        start_ms = self.after(start_ms)?;
                    }
                },
            }
        };

        Ok(FetchOutcome {
            candles,
            requests,
            next_start_ms: start_ms,
            stop,
        })
    }

    /// Resume, paginate, normalize and persist in one bulk append.
    #[instrument(skip_all, fields(symbol = %self.config.symbol, interval = %self.config.interval))]
    pub async fn run<S>(&self, store: &S, shutdown: &mut Shutdown) -> Result<RunReport, Error>
    where
        S: CandleStore<Output = usize>,
    {
        let resumed_from_ms = self.resume_point(store).await?;
        let outcome = self.fetch_pages(resumed_from_ms, shutdown).await?;
        let records = normalize(&outcome.candles)?;

        let newest = outcome.candles.iter().map(|candle| candle.open_time_ms).max();
        let (rows_written, next_start_ms) = match (newest, records.last()) {
            (Some(newest), Some(last)) => {
                let next_start_ms = self.after(newest)?;
                let checkpoint = Checkpoint {
                    symbol: self.config.symbol.clone(),
                    interval: self.config.interval.clone(),
                    interval_ms: self.config.interval_ms,
                    last_open_time: last.open_time.clone(),
                    next_start_ms,
                };
                let written = store.append(&records, &checkpoint).await?;
                (written, next_start_ms)
            }
            _ => {
                info!("No new candles, store left unchanged.");
                (0, resumed_from_ms)
            }
        };

        info!(
            requests = outcome.requests,
            rows_written,
            stop = ?outcome.stop,
            "run finished, next start {}",
            readable(next_start_ms)
        );

        Ok(RunReport {
            resumed_from_ms,
            requests: outcome.requests,
            rows_written,
            next_start_ms,
            stop: outcome.stop,
        })
    }
}
