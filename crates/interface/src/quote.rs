use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 첫 조회 성공 전까지 모든 표시 필드가 갖는 값
pub const LOADING: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteKind {
    Gold,
    SpotGold,
    Silver,
    SpotSilver,
    ReferenceRate,
}

impl QuoteKind {
    pub const ALL: [QuoteKind; 5] = [
        QuoteKind::Gold,
        QuoteKind::SpotGold,
        QuoteKind::Silver,
        QuoteKind::SpotSilver,
        QuoteKind::ReferenceRate,
    ];
}

impl fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuoteKind::Gold => "gold",
            QuoteKind::SpotGold => "spot_gold",
            QuoteKind::Silver => "silver",
            QuoteKind::SpotSilver => "spot_silver",
            QuoteKind::ReferenceRate => "reference_rate",
        };
        f.write_str(s)
    }
}

/// 심볼 하나의 정규화된 시세
/// 표시용 문자열은 포맷팅 없이 피드 값을 그대로 담는다
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub buy: String,
    pub sell: String,
    pub reference_price: String,
    pub change: String,
    pub is_up: bool,
    pub high: String,
    pub low: String,
    pub open: String,
    pub close: String,
}

impl Default for Quote {
    fn default() -> Self {
        Self {
            buy: LOADING.to_string(),
            sell: LOADING.to_string(),
            reference_price: LOADING.to_string(),
            change: LOADING.to_string(),
            is_up: false,
            high: LOADING.to_string(),
            low: LOADING.to_string(),
            open: LOADING.to_string(),
            close: LOADING.to_string(),
        }
    }
}

impl Quote {
    /// 아직 어떤 값도 받지 못한 상태인지
    pub fn is_loading(&self) -> bool {
        *self == Quote::default()
    }
}

/// 추적하는 심볼 전체 (고정 집합)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSet {
    pub gold: Quote,
    pub spot_gold: Quote,
    pub silver: Quote,
    pub spot_silver: Quote,
    pub reference_rate: Quote,
}

impl QuoteSet {
    pub fn get(&self, kind: QuoteKind) -> &Quote {
        match kind {
            QuoteKind::Gold => &self.gold,
            QuoteKind::SpotGold => &self.spot_gold,
            QuoteKind::Silver => &self.silver,
            QuoteKind::SpotSilver => &self.spot_silver,
            QuoteKind::ReferenceRate => &self.reference_rate,
        }
    }

    pub fn get_mut(&mut self, kind: QuoteKind) -> &mut Quote {
        match kind {
            QuoteKind::Gold => &mut self.gold,
            QuoteKind::SpotGold => &mut self.spot_gold,
            QuoteKind::Silver => &mut self.silver,
            QuoteKind::SpotSilver => &mut self.spot_silver,
            QuoteKind::ReferenceRate => &mut self.reference_rate,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuoteKind, &Quote)> {
        QuoteKind::ALL.into_iter().map(move |k| (k, self.get(k)))
    }
}

/// 스케줄러가 화면 레이어에 공개하는 상태
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuoteBoard {
    pub quotes: QuoteSet,
    /// 마지막으로 반영된 성공 사이클 시각 (모든 시세 공통)
    pub last_updated: Option<DateTime<Utc>>,
    pub is_refreshing: bool,
    /// 진단용: 마지막 실패 사유. 성공 사이클이 반영되면 비워진다
    pub last_error: Option<String>,
    /// 마지막으로 반영된 요청 시퀀스 번호
    pub applied_seq: u64,
}

/// 피드가 내려주는 티커 레코드 하나
/// 필드가 문자열 또는 숫자로 섞여서 오므로 모두 표시 문자열로 받는다
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "WireTicker")]
pub struct RawTicker {
    pub symbol: Option<String>,
    pub rate: Option<String>,
    pub buy: Option<String>,
    pub sell: Option<String>,
    pub chg: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub open: Option<String>,
    pub close: Option<String>,
}

/// 심볼 키가 `symb`, `symbol` 중 하나 또는 둘 다 올 수 있다 (`symb` 우선)
#[derive(Deserialize)]
struct WireTicker {
    #[serde(default, deserialize_with = "display_value")]
    symb: Option<String>,
    #[serde(default, deserialize_with = "display_value")]
    symbol: Option<String>,
    #[serde(default, deserialize_with = "display_value")]
    rate: Option<String>,
    #[serde(default, deserialize_with = "display_value")]
    buy: Option<String>,
    #[serde(default, deserialize_with = "display_value")]
    sell: Option<String>,
    #[serde(default, deserialize_with = "display_value")]
    chg: Option<String>,
    #[serde(default, deserialize_with = "display_value")]
    high: Option<String>,
    #[serde(default, deserialize_with = "display_value")]
    low: Option<String>,
    #[serde(default, deserialize_with = "display_value")]
    open: Option<String>,
    #[serde(default, deserialize_with = "display_value")]
    close: Option<String>,
}

impl From<WireTicker> for RawTicker {
    fn from(wire: WireTicker) -> Self {
        Self {
            symbol: wire.symb.or(wire.symbol),
            rate: wire.rate,
            buy: wire.buy,
            sell: wire.sell,
            chg: wire.chg,
            high: wire.high,
            low: wire.low,
            open: wire.open,
            close: wire.close,
        }
    }
}

impl RawTicker {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Default::default()
        }
    }
}

fn display_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
