//! PostgreSQL 저장소.
//!
//! 분석 엔진의 [`AnalyticsStore`], 수신 파이프라인의 [`EventSink`],
//! 벤치마크 수집기의 [`BenchmarkStore`]를 하나의 연결 풀 위에 구현합니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use portfolio_analytics::{AnalyticsStore, EventSink};
use portfolio_core::{
    AnalyticsRecord, BenchmarkBar, EquityEvent, EquitySnapshot, OhlcBar, PortfolioResult,
    PositionEvent, TradeEvent,
};
use sqlx::PgPool;
use tracing::debug;

use crate::benchmark::BenchmarkStore;
use crate::database::Database;
use crate::repository::{AnalyticsRepository, EquityRepository, OhlcRepository, TradeRepository};

/// PostgreSQL 기반 저장소.
#[derive(Clone)]
pub struct PgAnalyticsStore {
    pool: PgPool,
}

impl PgAnalyticsStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 심볼의 마지막 저장 일자.
    pub async fn latest_benchmark_date(&self, symbol: &str) -> PortfolioResult<Option<NaiveDate>> {
        Ok(OhlcRepository::latest_date(&self.pool, symbol).await?)
    }
}

#[async_trait]
impl AnalyticsStore for PgAnalyticsStore {
    async fn earliest_equity_time(&self) -> PortfolioResult<Option<DateTime<Utc>>> {
        Ok(EquityRepository::earliest_time(&self.pool).await?)
    }

    async fn load_equity_history(
        &self,
        from: Option<DateTime<Utc>>,
    ) -> PortfolioResult<Vec<EquitySnapshot>> {
        let snapshots = EquityRepository::load_history(&self.pool, from).await?;
        debug!(count = snapshots.len(), "자산 이력 로드");
        Ok(snapshots)
    }

    async fn load_benchmark_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> PortfolioResult<Vec<BenchmarkBar>> {
        Ok(OhlcRepository::load_closes(&self.pool, symbol, from).await?)
    }

    async fn upsert_analytics(&self, records: &[AnalyticsRecord]) -> PortfolioResult<usize> {
        Ok(AnalyticsRepository::upsert_batch(&self.pool, records).await?)
    }

    async fn load_analytics(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> PortfolioResult<Vec<AnalyticsRecord>> {
        Ok(AnalyticsRepository::load_range(&self.pool, from, to).await?)
    }
}

#[async_trait]
impl EventSink for PgAnalyticsStore {
    async fn record_trade(&self, event: &TradeEvent) -> PortfolioResult<bool> {
        Ok(TradeRepository::insert_trade(&self.pool, event).await?)
    }

    async fn upsert_position(&self, event: &PositionEvent) -> PortfolioResult<()> {
        Ok(TradeRepository::upsert_position(&self.pool, event).await?)
    }

    async fn insert_equity(&self, event: &EquityEvent) -> PortfolioResult<()> {
        Ok(EquityRepository::insert(&self.pool, &event.data).await?)
    }
}

#[async_trait]
impl BenchmarkStore for PgAnalyticsStore {
    async fn upsert_daily_bars(&self, symbol: &str, bars: &[OhlcBar]) -> PortfolioResult<usize> {
        Ok(OhlcRepository::upsert_daily_bars(&self.pool, symbol, bars).await?)
    }
}
