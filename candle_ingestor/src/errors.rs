use thiserror::Error;

use crate::{
    io::sink::SinkError,
    providers::{ProviderError, ProviderInitError},
};

/// The unified error type for the `candle_ingestor` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An error related to configuration, detected before any I/O.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store's last `open_time` could not be turned back into a timestamp.
    #[error("Cannot parse stored open_time '{value}': {source}")]
    StoreParse {
        value: String,
        source: chrono::ParseError,
    },

    /// An error originating from the exchange (network, API, decoding).
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The exchange client could not be set up.
    #[error("Provider initialization error: {0}")]
    ProviderInit(#[from] ProviderInitError),

    /// An error originating from the output store.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Shutdown was requested before the run finished; nothing was written.
    #[error("Run cancelled before completion")]
    Cancelled,
}
