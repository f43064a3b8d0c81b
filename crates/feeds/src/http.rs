use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use interface::{FeedError, RawTicker};

use crate::TickerFeed;

/// HTTP GET 으로 티커 배열을 가져오는 피드
#[derive(Clone)]
pub struct HttpTickerFeed {
    http: reqwest::Client,
    url: String,
}

impl HttpTickerFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TickerFeed for HttpTickerFeed {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch_tickers(&self) -> Result<Vec<RawTicker>, FeedError> {
        let response = self.http.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_tickers(&body)
    }
}

/// 응답 본문을 티커 목록으로 파싱
/// 최상위가 배열이 아니면 실패, 배열 안의 깨진 레코드는 건너뛴다
pub fn parse_tickers(body: &str) -> Result<Vec<RawTicker>, FeedError> {
    let value: Value = serde_json::from_str(body)?;

    let records = match value {
        Value::Array(records) => records,
        other => {
            return Err(FeedError::Malformed(format!(
                "expected a JSON array, got {}",
                kind_of(&other)
            )))
        }
    };

    let total = records.len();
    let tickers: Vec<RawTicker> = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<RawTicker>(record) {
            Ok(t) => Some(t),
            Err(e) => {
                debug!("skipping ticker record: {}", e);
                None
            }
        })
        .collect();

    if tickers.len() < total {
        debug!("parsed {}/{} ticker records", tickers.len(), total);
    }

    Ok(tickers)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
