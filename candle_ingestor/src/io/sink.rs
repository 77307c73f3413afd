use std::path::PathBuf;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::{io::checkpoint::Checkpoint, models::candle::CandleRecord};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// A file could not be created, read or written.
    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The CSV store could not be read or written.
    #[snafu(display("CSV error on {}: {source}", path.display()))]
    Csv {
        path: PathBuf,
        source: csv::Error,
        backtrace: Backtrace,
    },

    /// The store has rows but no `open_time` column to resume from.
    #[snafu(display("{} has no '{column}' column", path.display()))]
    MissingColumn {
        path: PathBuf,
        column: &'static str,
        backtrace: Backtrace,
    },

    /// The checkpoint sidecar could not be encoded or decoded.
    #[snafu(display("Checkpoint error on {}: {source}", path.display()))]
    Checkpoint {
        path: PathBuf,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// The blocking store task panicked or was cancelled.
    #[snafu(display("Store task failed: {source}"))]
    Join {
        source: tokio::task::JoinError,
        backtrace: Backtrace,
    },
}

/// What a store knows about where the next run should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredResume {
    /// No rows yet; the configured start time applies.
    Empty,
    /// A checkpoint whose `last_open_time` matches the last stored row.
    ///
    /// It may still have been written for other settings; callers compare
    /// `symbol`, `interval` and `interval_ms` before trusting `next_start_ms`.
    Checkpoint(Checkpoint),
    /// Only the human-readable `open_time` of the last row is available.
    LastRow { open_time: String },
}

/// Persistence adapter for normalized candle rows.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// The type of output returned after a successful write operation.
    ///
    /// A file store returns the number of rows appended.
    type Output: Send;

    /// Reports where the rows already stored end.
    async fn resume_state(&self) -> Result<StoredResume, SinkError>;

    /// Appends `rows` after the existing ones and records `checkpoint`.
    ///
    /// A header is written only when the store holds nothing yet. Once the
    /// rows are written, failing to record the checkpoint is logged and does
    /// not fail the append; the next run then resumes from the last row.
    async fn append(
        &self,
        rows: &[CandleRecord],
        checkpoint: &Checkpoint,
    ) -> Result<Self::Output, SinkError>;
}
