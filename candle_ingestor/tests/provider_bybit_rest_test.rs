use candle_ingestor::{
    config::ExchangeConfig,
    models::request_params::CandleRequest,
    providers::{
        DataProvider, ProviderError, ProviderInitError,
        bybit_rest::{
            BybitCredentials, BybitProvider,
            provider::{API_KEY_VAR, API_SECRET_VAR},
        },
    },
};
use serde_json::json;
use serial_test::serial;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header_exists, method, path, query_param},
};

const START_MS: i64 = 1_672_448_580_000; // 2022-12-31 01:03:00

fn exchange(server: &MockServer) -> ExchangeConfig {
    ExchangeConfig {
        base_url: server.uri(),
        ..ExchangeConfig::default()
    }
}

fn request() -> CandleRequest {
    CandleRequest {
        symbol: "BTCUSD".to_string(),
        interval: "3m".to_string(),
        interval_ms: 180_000,
        since_ms: START_MS,
        limit: 200,
    }
}

fn kline_body() -> serde_json::Value {
    json!({
        "retCode": 0,
        "retMsg": "OK",
        "result": {
            "category": "inverse",
            "symbol": "BTCUSD",
            "list": [
                ["1672448760000", "16560.5", "16570", "16555", "16565.5", "3200", "0.19"],
                ["1672448580000", "16550", "16562", "16548.5", "16560.5", "2100", "0.12"]
            ]
        },
        "retExtInfo": {},
        "time": 1672448800000i64
    })
}

#[tokio::test]
async fn test_fetch_returns_oldest_first_with_bounded_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v5/market/kline"))
        .and(query_param("category", "inverse"))
        .and(query_param("symbol", "BTCUSD"))
        .and(query_param("interval", "3"))
        .and(query_param("start", START_MS.to_string()))
        .and(query_param("end", (START_MS + 200 * 180_000 - 1).to_string()))
        .and(query_param("limit", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kline_body()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = BybitProvider::new(&exchange(&server), None).unwrap();
    let candles = provider.fetch_candles(request()).await.unwrap();

    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].open_time_ms, START_MS);
    assert_eq!(candles[1].open_time_ms, START_MS + 180_000);
    assert_eq!(candles[0].open, 16550.0);
    assert_eq!(candles[0].low, 16548.5);
    assert_eq!(candles[1].close, 16565.5);
    assert_eq!(candles[1].volume, 3200.0);
}

#[tokio::test]
async fn test_empty_list_is_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v5/market/kline"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": { "category": "inverse", "symbol": "BTCUSD", "list": [] }
        })))
        .mount(&server)
        .await;

    let provider = BybitProvider::new(&exchange(&server), None).unwrap();
    let candles = provider.fetch_candles(request()).await.unwrap();

    assert!(candles.is_empty());
}

#[tokio::test]
async fn test_nonzero_ret_code_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v5/market/kline"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retCode": 10001,
            "retMsg": "params error: symbol invalid",
            "result": {}
        })))
        .mount(&server)
        .await;

    let provider = BybitProvider::new(&exchange(&server), None).unwrap();
    let err = provider.fetch_candles(request()).await.unwrap_err();

    match err {
        ProviderError::Api { message, .. } => {
            assert!(message.contains("10001"));
            assert!(message.contains("symbol invalid"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_failure_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v5/market/kline"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let provider = BybitProvider::new(&exchange(&server), None).unwrap();
    let err = provider.fetch_candles(request()).await.unwrap_err();

    match err {
        ProviderError::Api { message, .. } => {
            assert!(message.contains("503"));
            assert!(message.contains("upstream unavailable"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_number_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v5/market/kline"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "list": [["1672448580000", "n/a", "16562", "16548.5", "16560.5", "2100", "0.12"]]
            }
        })))
        .mount(&server)
        .await;

    let provider = BybitProvider::new(&exchange(&server), None).unwrap();
    let err = provider.fetch_candles(request()).await.unwrap_err();

    assert!(matches!(err, ProviderError::Decode { ref value, .. } if value == "n/a"));
}

#[tokio::test]
async fn test_credentials_add_signed_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v5/market/kline"))
        .and(header_exists("X-BAPI-API-KEY"))
        .and(header_exists("X-BAPI-TIMESTAMP"))
        .and(header_exists("X-BAPI-RECV-WINDOW"))
        .and(header_exists("X-BAPI-SIGN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kline_body()))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = BybitCredentials::new("test-key", "test-secret");
    let provider = BybitProvider::new(&exchange(&server), Some(credentials)).unwrap();
    let candles = provider.fetch_candles(request()).await.unwrap();

    assert_eq!(candles.len(), 2);

    let received = server.received_requests().await.unwrap();
    let key = received[0].headers.get("X-BAPI-API-KEY").unwrap();
    assert_eq!(key.to_str().unwrap(), "test-key");
}

#[tokio::test]
async fn test_unknown_interval_is_rejected_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kline_body()))
        .expect(0)
        .mount(&server)
        .await;

    let provider = BybitProvider::new(&exchange(&server), None).unwrap();
    let err = provider
        .fetch_candles(CandleRequest {
            interval: "7x".to_string(),
            ..request()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Validation { .. }));
}

#[test]
#[serial]
fn test_required_credentials_must_be_present() {
    unsafe {
        std::env::remove_var(API_KEY_VAR);
        std::env::remove_var(API_SECRET_VAR);
    }

    let strict = ExchangeConfig {
        require_credentials: true,
        ..ExchangeConfig::default()
    };
    assert!(matches!(
        BybitProvider::from_config(&strict),
        Err(ProviderInitError::MissingEnvVar { .. })
    ));

    assert!(BybitProvider::from_config(&ExchangeConfig::default()).is_ok());
}

#[test]
#[serial]
fn test_credentials_from_env() {
    unsafe {
        std::env::set_var(API_KEY_VAR, "env-key");
        std::env::set_var(API_SECRET_VAR, "env-secret");
    }

    let strict = ExchangeConfig {
        require_credentials: true,
        ..ExchangeConfig::default()
    };
    let result = BybitProvider::from_config(&strict);

    unsafe {
        std::env::remove_var(API_KEY_VAR);
        std::env::remove_var(API_SECRET_VAR);
    }
    assert!(result.is_ok());
}
