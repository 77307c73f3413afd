use std::str::FromStr;

use serde::Deserialize;
use snafu::OptionExt;

use crate::{
    models::candle::Candle,
    providers::errors::{DecodeSnafu, ProviderError},
};

/// Envelope of every Bybit v5 response.
#[derive(Deserialize, Debug)]
pub struct BybitResponse {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg")]
    pub ret_msg: String,
    #[serde(default)]
    pub result: Option<BybitKlineResult>,
}

/// Error responses carry `"result": {}`, hence the defaults.
#[derive(Deserialize, Debug, Default)]
pub struct BybitKlineResult {
    #[serde(default)]
    pub list: Vec<BybitKline>,
}

/// One kline as Bybit sends it: seven strings,
/// `[startTime, open, high, low, close, volume, turnover]`.
#[derive(Deserialize, Debug)]
pub struct BybitKline(
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
);

fn coerce<T: FromStr>(field: &'static str, value: &str) -> Result<T, ProviderError> {
    value.trim().parse().ok().context(DecodeSnafu { field, value })
}

impl TryFrom<BybitKline> for Candle {
    type Error = ProviderError;

    fn try_from(kline: BybitKline) -> Result<Self, Self::Error> {
        Ok(Candle {
            open_time_ms: coerce("start_time", &kline.0)?,
            open: coerce("open", &kline.1)?,
            high: coerce("high", &kline.2)?,
            low: coerce("low", &kline.3)?,
            close: coerce("close", &kline.4)?,
            volume: coerce("volume", &kline.5)?,
        })
    }
}
