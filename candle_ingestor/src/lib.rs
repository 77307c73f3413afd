//! Incremental OHLCV candle ingestion.
//!
//! Pages through an exchange's kline endpoint from where the local store
//! ends up to the present and appends the new rows in one write.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod errors;
pub mod io;
pub mod models;
pub mod providers;
pub mod requests;
pub mod utils;

pub use config::IngestorConfig;
pub use errors::Error;
pub use requests::incremental::{IncrementalFetcher, RunReport, StopReason};
