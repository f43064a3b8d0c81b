use async_trait::async_trait;

use interface::{FeedError, RawTicker};

pub mod http;
pub mod normalizer;

/// 원시 티커 레코드를 내려주는 시세 피드
#[async_trait]
pub trait TickerFeed: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_tickers(&self) -> Result<Vec<RawTicker>, FeedError>;
}

// Convenience re-exports
pub use http::HttpTickerFeed;
pub use normalizer::{normalize, parse_number, SymbolMap};
