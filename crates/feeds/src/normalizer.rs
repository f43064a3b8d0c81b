use interface::{Quote, QuoteKind, QuoteSet, RawTicker};

/// 추적 심볼 → 피드 심볼 문자열 매핑
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMap {
    pub gold: String,
    pub spot_gold: String,
    pub silver: String,
    pub spot_silver: String,
    pub reference_rate: String,
}

impl Default for SymbolMap {
    fn default() -> Self {
        Self {
            gold: "GOLD".to_string(),
            spot_gold: "XAUUSD".to_string(),
            silver: "SILVER".to_string(),
            spot_silver: "XAGUSD".to_string(),
            reference_rate: "USDTHB".to_string(),
        }
    }
}

impl SymbolMap {
    pub fn symbol(&self, kind: QuoteKind) -> &str {
        match kind {
            QuoteKind::Gold => &self.gold,
            QuoteKind::SpotGold => &self.spot_gold,
            QuoteKind::Silver => &self.silver,
            QuoteKind::SpotSilver => &self.spot_silver,
            QuoteKind::ReferenceRate => &self.reference_rate,
        }
    }
}

/// 원시 티커 목록을 고정된 시세 집합으로 정규화
///
/// 심볼은 정확히 일치하는 첫 레코드를 사용한다. 레코드가 없거나 레코드에
/// 필드가 빠져 있으면 이전 값(최초에는 LOADING)을 그대로 유지한다.
pub fn normalize(previous: &QuoteSet, tickers: &[RawTicker], symbols: &SymbolMap) -> QuoteSet {
    let mut next = previous.clone();

    for kind in QuoteKind::ALL {
        let symbol = symbols.symbol(kind);
        let ticker = tickers
            .iter()
            .find(|t| t.symbol.as_deref() == Some(symbol));

        if let Some(ticker) = ticker {
            merge(next.get_mut(kind), ticker);
        }
    }

    next
}

fn merge(quote: &mut Quote, ticker: &RawTicker) {
    keep_or_replace(&mut quote.buy, &ticker.buy);
    keep_or_replace(&mut quote.sell, &ticker.sell);
    keep_or_replace(&mut quote.reference_price, &ticker.rate);
    keep_or_replace(&mut quote.change, &ticker.chg);
    keep_or_replace(&mut quote.high, &ticker.high);
    keep_or_replace(&mut quote.low, &ticker.low);
    keep_or_replace(&mut quote.open, &ticker.open);
    keep_or_replace(&mut quote.close, &ticker.close);

    quote.is_up = parse_number(&quote.change) > 0.0;
}

fn keep_or_replace(field: &mut String, incoming: &Option<String>) {
    if let Some(value) = incoming {
        field.clone_from(value);
    }
}

/// 등락 문자열을 숫자로 변환. 숫자가 아니면 0
/// 앞뒤 공백, 선행 '+', 천 단위 ',' 와 후행 '%' 는 허용한다
pub fn parse_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
