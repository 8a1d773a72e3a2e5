//! 분석 엔진이 사용하는 저장소 인터페이스.
//!
//! PostgreSQL 구현은 `portfolio-data` 크레이트에 있으며,
//! 테스트에서는 메모리 구현을 사용합니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use portfolio_core::{
    AnalyticsRecord, BenchmarkBar, EquityEvent, EquitySnapshot, PortfolioResult, PositionEvent,
    TradeEvent,
};

use crate::alignment::{DailyReturnSeries, SeriesAligner};

/// 분석 저장소.
///
/// 재계산 1회는 자신만의 저장소 뷰를 가지며, 다른 호출과 메모리 상태를 공유하지 않습니다.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// 가장 오래된 자산 스냅샷 시각. 데이터가 없으면 `None`.
    async fn earliest_equity_time(&self) -> PortfolioResult<Option<DateTime<Utc>>>;

    /// 자산 스냅샷 이력 (시간순). `from`이 없으면 전체 이력.
    async fn load_equity_history(
        &self,
        from: Option<DateTime<Utc>>,
    ) -> PortfolioResult<Vec<EquitySnapshot>>;

    /// 벤치마크 종가 (날짜순). 알 수 없는 심볼이면 빈 목록.
    async fn load_benchmark_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> PortfolioResult<Vec<BenchmarkBar>>;

    /// 분석 레코드를 날짜 기준으로 upsert.
    ///
    /// 한 번의 호출은 하나의 원자적 배치입니다. 실패하면 아무것도 기록되지 않아야 합니다.
    async fn upsert_analytics(&self, records: &[AnalyticsRecord]) -> PortfolioResult<usize>;

    /// 저장된 분석 레코드 (날짜 오름차순). 범위는 양 끝 포함.
    async fn load_analytics(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> PortfolioResult<Vec<AnalyticsRecord>>;

    /// 벤치마크 일간 수익률.
    async fn load_benchmark_returns(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> PortfolioResult<DailyReturnSeries> {
        let bars = self.load_benchmark_bars(symbol, from).await?;
        Ok(SeriesAligner::benchmark_daily_returns(&bars))
    }
}

/// 수신 이벤트 영속화 인터페이스.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// 거래 저장. 같은 `external_id`가 이미 있으면 `false`를 반환하고 아무것도 쓰지 않습니다.
    async fn record_trade(&self, event: &TradeEvent) -> PortfolioResult<bool>;

    /// 종목별 현재 포지션 upsert.
    async fn upsert_position(&self, event: &PositionEvent) -> PortfolioResult<()>;

    /// 자산 스냅샷 추가.
    async fn insert_equity(&self, event: &EquityEvent) -> PortfolioResult<()>;
}
