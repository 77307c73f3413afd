use serde::{Deserialize, Serialize};
use snafu::OptionExt;

use crate::{
    models::{request_params::CandleRequest, timeframe::{TimeFrame, TimeFrameError}},
    providers::errors::{ProviderError, ValidationSnafu},
};

/// Interval labels the kline endpoint accepts as-is.
const NATIVE_INTERVALS: [&str; 13] = [
    "1", "3", "5", "15", "30", "60", "120", "240", "360", "720", "D", "W", "M",
];

/// Bybit product line; selects which kline book is queried.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Spot,
    Linear,
    /// Coin-margined contracts such as `BTCUSD`.
    #[default]
    Inverse,
}

/// Query string of `GET /v5/market/kline`.
///
/// Field order is the order the parameters are serialized (and signed) in.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct KlineQuery {
    pub category: Category,
    pub symbol: String,
    pub interval: String,
    pub start: i64,
    pub end: i64,
    pub limit: u32,
}

/// Translates a configured interval label into Bybit's vocabulary.
///
/// Labels such as `3m` or `4h` are mapped (`3`, `240`); labels that already
/// are Bybit intervals pass through unchanged.
pub fn bybit_interval(label: &str) -> Result<String, ProviderError> {
    let label = label.trim();
    if NATIVE_INTERVALS.contains(&label) {
        return Ok(label.to_string());
    }

    let invalid = |e: TimeFrameError| {
        ValidationSnafu {
            message: e.to_string(),
        }
        .build()
    };

    label.parse::<TimeFrame>().map_err(invalid)?.bybit_interval().map_err(invalid)
}

/// Builds the kline query for one page.
///
/// `end` bounds the window to `limit` bars after `since_ms`; without it Bybit
/// answers with the most recent bars instead of the ones following `start`.
pub fn construct_params(request: &CandleRequest, category: Category) -> Result<KlineQuery, ProviderError> {
    if request.limit == 0 {
        return ValidationSnafu {
            message: "page limit must be at least 1",
        }
        .fail();
    }

    Ok(KlineQuery {
        category,
        symbol: request.symbol.clone(),
        interval: bybit_interval(&request.interval)?,
        start: request.since_ms,
        end: request.window_end_ms().context(ValidationSnafu {
            message: "page window overflows the timestamp range",
        })?,
        limit: request.limit,
    })
}
