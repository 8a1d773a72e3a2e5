//! 테이블별 Repository.
//!
//! 모든 Repository는 상태가 없는 유닛 구조체이며 연결 풀이나 트랜잭션을 인자로 받습니다.
//! 계산은 `f64`로 하고 저장은 `NUMERIC`으로 하므로 경계에서 변환합니다.

mod analytics;
mod equity;
mod ohlc;
mod trades;

pub use analytics::AnalyticsRepository;
pub use equity::EquityRepository;
pub use ohlc::OhlcRepository;
pub use trades::TradeRepository;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// `f64` → `NUMERIC`. NaN/무한대는 `None`(NULL)이 됩니다.
pub(crate) fn to_decimal(value: f64, scale: u32) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64_retain(value).map(|d| d.round_dp(scale))
}

/// 선택 값 변환.
pub(crate) fn opt_decimal(value: Option<f64>, scale: u32) -> Option<Decimal> {
    value.and_then(|v| to_decimal(v, scale))
}

/// `NUMERIC` → `f64`.
pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
