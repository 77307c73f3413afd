//! Provider abstraction for candle sources.
//!
//! This module defines the [`DataProvider`] trait, the single operation the
//! incremental fetcher needs from an exchange: fetch one bounded page of
//! candles starting at a given timestamp.
//!
//! Each concrete exchange (currently Bybit) implements [`DataProvider`] and
//! owns its own connection, authentication, rate limiting and
//! request/response translation.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use candle_ingestor::models::{candle::Candle, request_params::CandleRequest};
//! use candle_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     async fn fetch_candles(
//!         &self,
//!         _request: CandleRequest,
//!     ) -> Result<Vec<Candle>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod bybit_rest;
pub mod errors;

use async_trait::async_trait;

pub use errors::{ProviderError, ProviderInitError};

use crate::models::{candle::Candle, request_params::CandleRequest};

/// Trait for fetching one page of candles from an exchange.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches up to `request.limit` candles opening at or after `request.since_ms`.
    ///
    /// Rows come back oldest-first. An empty vector means the exchange has no
    /// data at or after `since_ms`.
    async fn fetch_candles(&self, request: CandleRequest) -> Result<Vec<Candle>, ProviderError>;
}

#[async_trait]
impl<P> DataProvider for Box<P>
where
    P: DataProvider + ?Sized,
{
    async fn fetch_candles(&self, request: CandleRequest) -> Result<Vec<Candle>, ProviderError> {
        (**self).fetch_candles(request).await
    }
}

#[async_trait]
impl<P> DataProvider for &P
where
    P: DataProvider + ?Sized,
{
    async fn fetch_candles(&self, request: CandleRequest) -> Result<Vec<Candle>, ProviderError> {
        (**self).fetch_candles(request).await
    }
}
