use thiserror::Error;

/// 시세 피드 조회 실패
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("other error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Malformed(e.to_string())
    }
}

/// OS 라이프사이클 이벤트 구독 실패
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("lifecycle source unavailable")]
    Unavailable,
    #[error("other error: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
#[error("refresh failed: {0}")]
pub struct RefreshError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// 라우팅 결정 전에 세션 소스가 닫힘
    #[error("session source closed before a routing decision was possible")]
    SourceClosed,
    #[error("bootstrap cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}
