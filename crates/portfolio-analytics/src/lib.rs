//! 포트폴리오 분석 재계산 엔진.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 수익률/리스크 계산 (일간/누적 수익률, 최대 낙폭, 롤링 변동성/샤프/베타/알파)
//! - 거래 통계 (승률, Profit Factor, 기대값)
//! - 일별 시계열 정렬 (스냅샷 → 일별, 벤치마크 정렬)
//! - 재계산 오케스트레이터와 저장소 인터페이스
//! - 분석 결과 pub/sub 브로커

pub mod alignment;
pub mod broker;
pub mod performance;
pub mod recompute;
pub mod store;

pub use alignment::{DailyEquitySeries, DailyReturnSeries, DateSeries, SeriesAligner};
pub use broker::{
    create_broker, AnalyticsBroker, BroadcastMessage, Channel, MessageKind, SharedBroker,
};
pub use performance::{
    average_trade, cumulative_returns, daily_returns, expectancy, max_drawdown, profit_factor,
    rolling_beta_alpha, rolling_sharpe, rolling_volatility, win_rate, AverageTrade, BetaAlpha,
};
pub use recompute::{
    compute_pass, ComputedPass, RecomputeEngine, RecomputeOutcome, RecomputeSettings,
    RecomputeSummary,
};
pub use store::{AnalyticsStore, EventSink};
