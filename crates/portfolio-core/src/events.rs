//! 웹훅 수신 이벤트.
//!
//! 외부 소스(TradingView, 수동 입력 등)에서 들어오는 이벤트는 `eventType` 태그로
//! 구분되는 세 가지 형태입니다. 각 변형은 자신의 필드 검증을 직접 수행합니다.
//!
//! ```json
//! {"eventType": "trade", "source": "tradingview",
//!  "data": {"symbol": "spy", "time": "2024-03-01T15:30:00Z", "side": "buy",
//!           "qty": 10, "price": 512.3, "externalId": "tv-1"}}
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{PortfolioError, PortfolioResult};

fn default_source() -> String {
    "webhook".to_string()
}

/// 거래 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

/// 거래 체결 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeData {
    /// 종목 심볼 (예: NQ=F, SPY)
    pub symbol: String,
    /// 체결 시각 (UTC)
    pub time: DateTime<Utc>,
    pub side: TradeSide,
    /// 수량 (양수)
    pub qty: f64,
    /// 체결가 (양수)
    pub price: f64,
    /// 수수료
    #[serde(default)]
    pub fees: f64,
    /// 외부 소스의 고유 ID (중복 방지 키)
    #[serde(default)]
    pub external_id: Option<String>,
}

/// 포지션 갱신 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub symbol: String,
    /// 현재 수량 (양수=롱, 음수=숏, 0=청산)
    pub qty: f64,
    /// 평균 진입가 (양수)
    pub avg_price: f64,
    /// 실현 손익
    #[serde(default)]
    pub realized_pnl: f64,
    pub time: DateTime<Utc>,
}

/// 자산 스냅샷 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityData {
    pub time: DateTime<Utc>,
    /// 총 자산
    pub equity: f64,
    /// 현금
    pub cash: f64,
    /// 사용 중인 증거금
    #[serde(default)]
    pub margin_used: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    #[serde(default = "default_source")]
    pub source: String,
    pub data: TradeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEvent {
    #[serde(default = "default_source")]
    pub source: String,
    pub data: PositionData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityEvent {
    #[serde(default = "default_source")]
    pub source: String,
    pub data: EquityData,
}

/// 수신 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "lowercase")]
pub enum IngestEvent {
    Trade(TradeEvent),
    Position(PositionEvent),
    Equity(EquityEvent),
}

impl IngestEvent {
    /// JSON 본문을 파싱하고 검증합니다.
    pub fn from_json(body: &str) -> PortfolioResult<Self> {
        let event: IngestEvent = serde_json::from_str(body)
            .map_err(|e| PortfolioError::InvalidInput(format!("이벤트 파싱 실패: {}", e)))?;
        event.validate()
    }

    /// 변형별 검증 후 정규화된 이벤트를 반환합니다.
    pub fn validate(self) -> PortfolioResult<Self> {
        Ok(match self {
            IngestEvent::Trade(e) => IngestEvent::Trade(TradeEvent {
                data: e.data.validate()?,
                source: e.source,
            }),
            IngestEvent::Position(e) => IngestEvent::Position(PositionEvent {
                data: e.data.validate()?,
                source: e.source,
            }),
            IngestEvent::Equity(e) => IngestEvent::Equity(EquityEvent {
                data: e.data.validate()?,
                source: e.source,
            }),
        })
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            IngestEvent::Trade(_) => "trade",
            IngestEvent::Position(_) => "position",
            IngestEvent::Equity(_) => "equity",
        }
    }

    pub fn source(&self) -> &str {
        match self {
            IngestEvent::Trade(e) => &e.source,
            IngestEvent::Position(e) => &e.source,
            IngestEvent::Equity(e) => &e.source,
        }
    }

    /// 이벤트 발생 시각.
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            IngestEvent::Trade(e) => e.data.time,
            IngestEvent::Position(e) => e.data.time,
            IngestEvent::Equity(e) => e.data.time,
        }
    }

    /// 재계산을 시작할 날짜 (집계 시간대 기준).
    pub fn event_date(&self, tz: &Tz) -> NaiveDate {
        self.time().with_timezone(tz).date_naive()
    }

    /// 종목 관련 이벤트의 심볼.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            IngestEvent::Trade(e) => Some(&e.data.symbol),
            IngestEvent::Position(e) => Some(&e.data.symbol),
            IngestEvent::Equity(_) => None,
        }
    }
}

impl TradeData {
    pub fn validate(mut self) -> PortfolioResult<Self> {
        self.symbol = normalize_symbol(&self.symbol)?;
        require_positive("qty", self.qty)?;
        require_positive("price", self.price)?;
        if !self.fees.is_finite() || self.fees < 0.0 {
            return Err(PortfolioError::InvalidInput(format!(
                "fees는 0 이상이어야 합니다: {}",
                self.fees
            )));
        }
        self.external_id = self
            .external_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        Ok(self)
    }
}

impl PositionData {
    pub fn validate(mut self) -> PortfolioResult<Self> {
        self.symbol = normalize_symbol(&self.symbol)?;
        require_finite("qty", self.qty)?;
        require_positive("avgPrice", self.avg_price)?;
        require_finite("realizedPnl", self.realized_pnl)?;
        Ok(self)
    }
}

impl EquityData {
    pub fn validate(self) -> PortfolioResult<Self> {
        require_finite("equity", self.equity)?;
        require_finite("cash", self.cash)?;
        if let Some(margin) = self.margin_used {
            require_finite("marginUsed", margin)?;
        }
        Ok(self)
    }
}

/// 심볼 앞뒤 공백 제거 및 대문자 변환. 빈 심볼은 거부합니다.
pub fn normalize_symbol(symbol: &str) -> PortfolioResult<String> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Err(PortfolioError::InvalidInput(
            "symbol은 비어 있을 수 없습니다".to_string(),
        ));
    }
    Ok(trimmed.to_uppercase())
}

fn require_finite(field: &str, value: f64) -> PortfolioResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PortfolioError::InvalidInput(format!(
            "{}는 유한한 숫자여야 합니다",
            field
        )))
    }
}

fn require_positive(field: &str, value: f64) -> PortfolioResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PortfolioError::InvalidInput(format!(
            "{}는 양수여야 합니다: {}",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trade_event_normalizes_symbol() {
        let body = r#"{
            "eventType": "trade",
            "data": {"symbol": "  spy ", "time": "2024-03-01T15:30:00Z",
                     "side": "buy", "qty": 10, "price": 512.3, "externalId": "tv-1"}
        }"#;
        let event = IngestEvent::from_json(body).unwrap();
        assert_eq!(event.event_type(), "trade");
        assert_eq!(event.source(), "webhook");
        assert_eq!(event.symbol(), Some("SPY"));

        match event {
            IngestEvent::Trade(trade) => {
                assert_eq!(trade.data.side, TradeSide::Buy);
                assert_eq!(trade.data.fees, 0.0);
                assert_eq!(trade.data.external_id.as_deref(), Some("tv-1"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_trade_validation_rules() {
        let base = TradeData {
            symbol: "AAPL".to_string(),
            time: Utc::now(),
            side: TradeSide::Sell,
            qty: 1.0,
            price: 100.0,
            fees: 0.0,
            external_id: None,
        };

        assert!(TradeData { qty: 0.0, ..base.clone() }.validate().is_err());
        assert!(TradeData { price: -1.0, ..base.clone() }.validate().is_err());
        assert!(TradeData { fees: -0.01, ..base.clone() }.validate().is_err());
        assert!(TradeData { symbol: "   ".to_string(), ..base.clone() }
            .validate()
            .is_err());
        assert!(base.validate().is_ok());
    }

    #[test]
    fn test_position_allows_short_and_flat() {
        let body = r#"{"eventType": "position", "source": "manual",
            "data": {"symbol": "nq=f", "qty": -2, "avgPrice": 18000.5, "time": "2024-03-01T20:00:00Z"}}"#;
        let event = IngestEvent::from_json(body).unwrap();
        assert_eq!(event.symbol(), Some("NQ=F"));
        assert_eq!(event.source(), "manual");

        let bad = r#"{"eventType": "position",
            "data": {"symbol": "NQ=F", "qty": 0, "avgPrice": 0, "time": "2024-03-01T20:00:00Z"}}"#;
        assert!(IngestEvent::from_json(bad).is_err());
    }

    #[test]
    fn test_equity_event_date_uses_reporting_timezone() {
        let body = r#"{"eventType": "equity",
            "data": {"time": "2024-03-02T02:00:00Z", "equity": 101000, "cash": 5000}}"#;
        let event = IngestEvent::from_json(body).unwrap();
        assert_eq!(event.symbol(), None);

        // 02:00 UTC는 뉴욕 기준 전날 21:00
        let tz: Tz = "America/New_York".parse().unwrap();
        assert_eq!(
            event.event_date(&tz),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            event.event_date(&Tz::UTC),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let body = r#"{"eventType": "dividend", "data": {}}"#;
        assert!(matches!(
            IngestEvent::from_json(body),
            Err(PortfolioError::InvalidInput(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_normalize_symbol_is_trimmed_uppercase(symbol in "[ ]{0,3}[a-zA-Z0-9=.]{1,8}[ ]{0,3}") {
            let normalized = normalize_symbol(&symbol).unwrap();
            proptest::prop_assert_eq!(normalized.clone(), symbol.trim().to_uppercase());
            proptest::prop_assert!(!normalized.starts_with(' ') && !normalized.ends_with(' '));
        }
    }
}
