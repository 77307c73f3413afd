pub mod candle;
pub mod request_params;
pub mod timeframe;
