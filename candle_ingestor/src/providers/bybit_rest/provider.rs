use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, header::HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    config::ExchangeConfig,
    models::{candle::Candle, request_params::CandleRequest},
    providers::{
        DataProvider, ProviderError, ProviderInitError,
        bybit_rest::{
            params::{Category, construct_params},
            response::BybitResponse,
        },
        errors::{ApiSnafu, ClientBuildSnafu, MissingEnvVarSnafu, ReqwestSnafu, SigningSnafu},
    },
};

const KLINE_PATH: &str = "/v5/market/kline";
const RECV_WINDOW_MS: &str = "5000";

pub const API_KEY_VAR: &str = "BYBIT_API_KEY";
pub const API_SECRET_VAR: &str = "BYBIT_API_SECRET";

/// API key pair used to sign requests.
pub struct BybitCredentials {
    api_key: SecretString,
    api_secret: SecretString,
}

impl BybitCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            api_secret: SecretString::from(api_secret.into()),
        }
    }

    /// Reads the key pair from `BYBIT_API_KEY` and `BYBIT_API_SECRET`.
    pub fn from_env() -> Result<Self, ProviderInitError> {
        let api_key = get_env_var(API_KEY_VAR).context(MissingEnvVarSnafu)?;
        let api_secret = get_env_var(API_SECRET_VAR).context(MissingEnvVarSnafu)?;
        Ok(Self::new(api_key, api_secret))
    }

    /// HMAC-SHA256 over `timestamp + api_key + recv_window + query`, hex encoded.
    fn sign(&self, timestamp_ms: i64, query: &str) -> Result<String, ProviderError> {
        let payload = format!(
            "{timestamp_ms}{}{RECV_WINDOW_MS}{query}",
            self.api_key.expose_secret()
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.expose_secret().as_bytes())
            .map_err(|e| {
                SigningSnafu {
                    message: e.to_string(),
                }
                .build()
            })?;
        mac.update(payload.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ProviderError> {
    HeaderValue::from_str(value).map_err(|e| {
        SigningSnafu {
            message: e.to_string(),
        }
        .build()
    })
}

pub struct BybitProvider {
    client: Client,
    base_url: String,
    category: Category,
    credentials: Option<BybitCredentials>,
    rate_limiter: DefaultDirectRateLimiter,
}

impl BybitProvider {
    /// Creates a provider from the exchange settings.
    ///
    /// Without credentials every request goes to the public endpoint unsigned.
    pub fn new(
        config: &ExchangeConfig,
        credentials: Option<BybitCredentials>,
    ) -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            category: config.category,
            credentials,
            rate_limiter: RateLimiter::direct(Quota::per_second(config.requests_per_second)),
        })
    }

    /// Creates a provider, picking credentials up from the environment.
    ///
    /// Missing credentials are an error only when `require_credentials` is set.
    pub fn from_config(config: &ExchangeConfig) -> Result<Self, ProviderInitError> {
        let credentials = match BybitCredentials::from_env() {
            Ok(credentials) => Some(credentials),
            Err(e) if config.require_credentials => return Err(e),
            Err(e) => {
                debug!("{e}; using unsigned requests");
                None
            }
        };
        Self::new(config, credentials)
    }
}

#[async_trait]
impl DataProvider for BybitProvider {
    async fn fetch_candles(&self, request: CandleRequest) -> Result<Vec<Candle>, ProviderError> {
        let query = construct_params(&request, self.category)?;

        self.rate_limiter.until_ready().await;

        let mut http_request = self
            .client
            .get(format!("{}{KLINE_PATH}", self.base_url))
            .query(&query)
            .build()
            .context(ReqwestSnafu)?;

        if let Some(credentials) = &self.credentials {
            let timestamp = Utc::now().timestamp_millis();
            let signature =
                credentials.sign(timestamp, http_request.url().query().unwrap_or_default())?;

            let headers = http_request.headers_mut();
            headers.insert("X-BAPI-API-KEY", header_value(credentials.api_key.expose_secret())?);
            headers.insert("X-BAPI-TIMESTAMP", header_value(&timestamp.to_string())?);
            headers.insert("X-BAPI-RECV-WINDOW", header_value(RECV_WINDOW_MS)?);
            headers.insert("X-BAPI-SIGN", header_value(&signature)?);
        }

        debug!(url = %http_request.url(), "requesting kline page");
        let response = self.client.execute(http_request).await.context(ReqwestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return ApiSnafu {
                message: format!("HTTP {status}: {body}"),
            }
            .fail();
        }

        let body = response.json::<BybitResponse>().await.context(ReqwestSnafu)?;
        if body.ret_code != 0 {
            return ApiSnafu {
                message: format!("code {}: {}", body.ret_code, body.ret_msg),
            }
            .fail();
        }

        let mut candles = body
            .result
            .unwrap_or_default()
            .list
            .into_iter()
            .map(Candle::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        // Bybit lists newest first.
        candles.sort_by_key(|candle| candle.open_time_ms);

        debug!(rows = candles.len(), "received kline page");
        Ok(candles)
    }
}
