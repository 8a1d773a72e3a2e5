//! 엔진이 소비하고 생산하는 데이터 형태.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 연간 거래일 수 (연율화 계수).
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// 변동성 롤링 윈도우 (거래일).
pub const VOLATILITY_WINDOW: usize = 20;

/// 샤프/베타/알파 롤링 윈도우 (거래일).
pub const RISK_ADJUSTED_WINDOW: usize = 60;

/// 샤프 비율 계산에 쓰는 연 무위험 수익률.
pub const RISK_FREE_RATE: f64 = 0.0;

/// 수익률을 하나라도 만들기 위한 최소 일별 데이터 수.
pub const MIN_DAILY_POINTS: usize = 2;

/// 특정 시점의 포트폴리오 자산 스냅샷.
///
/// 하루에 여러 개가 존재할 수 있으며, 일별 분석에는 그날의 마지막 스냅샷만 사용됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    /// 스냅샷 시각 (UTC)
    pub time: DateTime<Utc>,
    /// 총 자산 (현금 + 포지션 평가액)
    pub equity: f64,
    /// 현금
    pub cash: f64,
    /// 사용 중인 증거금
    pub margin_used: Option<f64>,
}

impl EquitySnapshot {
    /// 현금과 증거금 없이 자산만으로 스냅샷을 만듭니다.
    pub fn new(time: DateTime<Utc>, equity: f64) -> Self {
        Self {
            time,
            equity,
            cash: 0.0,
            margin_used: None,
        }
    }
}

/// 벤치마크 종가 (심볼, 날짜당 하나).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
}

/// 외부 데이터 소스에서 받은 일봉.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// 날짜별 분석 결과. 날짜당 정확히 하나이며 재계산 시 덮어씁니다.
///
/// 롤링 윈도우가 채워지지 않았거나 수치적으로 정의되지 않는 값은 `None`입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    /// 기준 날짜
    pub date: NaiveDate,
    /// 해당 날짜의 마지막 총 자산
    pub total_equity: f64,
    /// 일간 수익률
    pub daily_return: Option<f64>,
    /// 최초 자산 대비 누적 수익률
    pub cumulative_return: Option<f64>,
    /// 전체 이력 최대 낙폭 (음수)
    pub max_drawdown: Option<f64>,
    /// 20일 연율화 변동성
    pub volatility_20d: Option<f64>,
    /// 60일 연율화 샤프 비율
    pub sharpe_60d: Option<f64>,
    /// 기본 벤치마크 대비 60일 베타
    pub beta_60d: Option<f64>,
    /// 기본 벤치마크 대비 60일 연율화 알파
    pub alpha_60d: Option<f64>,
}

/// 유한한 값만 남기고 NaN/무한대는 `None`으로 바꿉니다.
///
/// 저장되는 모든 수치 필드는 이 함수를 거칩니다.
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
