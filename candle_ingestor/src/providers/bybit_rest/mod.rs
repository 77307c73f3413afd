//! Bybit v5 REST adapter for the kline endpoint.

pub mod params;
pub mod provider;
pub mod response;

pub use params::Category;
pub use provider::{BybitCredentials, BybitProvider};
