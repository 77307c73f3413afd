use serde::{Deserialize, Serialize};

/// Parameters for one page request against a market data provider.
///
/// Vendor-agnostic; each [`DataProvider`](crate::providers::DataProvider)
/// translates it into its own query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandleRequest {
    /// Instrument identifier (e.g. `"BTCUSD"`).
    pub symbol: String,

    /// Interval label as configured (e.g. `"3m"`). Providers translate or
    /// pass it through verbatim.
    pub interval: String,

    /// Duration of one bar in milliseconds, as supplied by the caller.
    pub interval_ms: i64,

    /// Earliest bar open time wanted (inclusive, epoch milliseconds).
    pub since_ms: i64,

    /// Maximum number of bars in the page.
    pub limit: u32,
}

impl CandleRequest {
    /// Last open time that can fit in a page of `limit` bars starting at `since_ms`.
    ///
    /// `None` when the window does not fit in an `i64`.
    pub fn window_end_ms(&self) -> Option<i64> {
        i64::from(self.limit)
            .checked_mul(self.interval_ms)
            .and_then(|span| self.since_ms.checked_add(span))
            .map(|end| end - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(interval_ms: i64, limit: u32) -> CandleRequest {
        CandleRequest {
            symbol: "BTCUSD".to_string(),
            interval: "3m".to_string(),
            interval_ms,
            since_ms: 1_000_000,
            limit,
        }
    }

    #[test]
    fn window_end_covers_exactly_limit_bars() {
        assert_eq!(
            request(180_000, 200).window_end_ms(),
            Some(1_000_000 + 200 * 180_000 - 1)
        );
    }

    #[test]
    fn window_end_overflow_is_none() {
        assert_eq!(request(i64::MAX / 2, 200).window_end_ms(), None);
        assert_eq!(request(i64::MAX, 1).window_end_ms(), None);
    }
}
