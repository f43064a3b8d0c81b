use std::{env, time::Duration};

use feeds::SymbolMap;
use interface::ConfigError;

use crate::bootstrap::DecisionSnapshot;

const DEFAULT_FEED_URL: &str = "http://localhost:12090/tickers";

/// 시세 폴링 설정
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// 티커 배열을 내려주는 GET 엔드포인트
    pub url: String,
    /// 폴링 주기. 피드 갱신 빈도와 무관하게 고정
    pub poll_interval: Duration,
    /// 요청 하나당 타임아웃
    pub timeout: Duration,
    pub symbols: SymbolMap,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            poll_interval: Duration::from_millis(1000),
            timeout: Duration::from_millis(5000),
            symbols: SymbolMap::default(),
        }
    }
}

/// 알림 갱신 주기 설정
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub refresh_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
        }
    }
}

/// 진입 애니메이션 및 라우팅 결정 설정
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub fade_in: Duration,
    pub hold: Duration,
    pub fade_out: Duration,
    pub decision: DecisionSnapshot,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            fade_in: Duration::from_millis(500),
            hold: Duration::from_millis(500),
            fade_out: Duration::from_millis(300),
            decision: DecisionSnapshot::Latest,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub feed: FeedConfig,
    pub refresh: RefreshConfig,
    pub bootstrap: BootstrapConfig,
}

impl EngineConfig {
    /// 환경변수에서 설정 로드 (.env 는 호출 전에 로드되어 있어야 함)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();
        let symbols = SymbolMap {
            gold: string_or(&lookup, "QUOTE_SYMBOL_GOLD", &defaults.feed.symbols.gold),
            spot_gold: string_or(&lookup, "QUOTE_SYMBOL_SPOT_GOLD", &defaults.feed.symbols.spot_gold),
            silver: string_or(&lookup, "QUOTE_SYMBOL_SILVER", &defaults.feed.symbols.silver),
            spot_silver: string_or(
                &lookup,
                "QUOTE_SYMBOL_SPOT_SILVER",
                &defaults.feed.symbols.spot_silver,
            ),
            reference_rate: string_or(
                &lookup,
                "QUOTE_SYMBOL_REFERENCE_RATE",
                &defaults.feed.symbols.reference_rate,
            ),
        };

        let feed = FeedConfig {
            url: string_or(&lookup, "QUOTE_FEED_URL", &defaults.feed.url),
            poll_interval: millis_or(&lookup, "QUOTE_POLL_INTERVAL_MS", defaults.feed.poll_interval)?,
            timeout: millis_or(&lookup, "QUOTE_FEED_TIMEOUT_MS", defaults.feed.timeout)?,
            symbols,
        };

        let refresh = RefreshConfig {
            refresh_interval: millis_or(
                &lookup,
                "NOTIFICATION_REFRESH_INTERVAL_MS",
                defaults.refresh.refresh_interval,
            )?,
        };

        let decision = match lookup("BOOTSTRAP_DECISION_SNAPSHOT") {
            None => defaults.bootstrap.decision,
            Some(value) => value
                .parse::<DecisionSnapshot>()
                .map_err(|_| ConfigError::Invalid {
                    key: "BOOTSTRAP_DECISION_SNAPSHOT".to_string(),
                    value,
                })?,
        };

        let bootstrap = BootstrapConfig {
            fade_in: millis_or(&lookup, "BOOTSTRAP_FADE_IN_MS", defaults.bootstrap.fade_in)?,
            hold: millis_or(&lookup, "BOOTSTRAP_HOLD_MS", defaults.bootstrap.hold)?,
            fade_out: millis_or(&lookup, "BOOTSTRAP_FADE_OUT_MS", defaults.bootstrap.fade_out)?,
            decision,
        };

        Ok(Self {
            feed,
            refresh,
            bootstrap,
        })
    }
}

fn string_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// 밀리초 값. 0 은 interval 을 만들 수 없으므로 거부
fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };

    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
    }
}
