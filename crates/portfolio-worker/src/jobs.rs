//! 스케줄러/CLI가 실행하는 작업.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use portfolio_analytics::{RecomputeEngine, RecomputeOutcome};
use portfolio_core::PortfolioResult;
use portfolio_data::BenchmarkUpdater;

use crate::queue::{execute_job, JobRunner, RecomputeJob};
use crate::retry::RetryPolicy;
use crate::schedule::DailyJob;
use crate::stats::RunStats;

#[async_trait]
impl JobRunner for RecomputeEngine {
    async fn run(&self, job: RecomputeJob) -> PortfolioResult<RecomputeOutcome> {
        match job {
            RecomputeJob::FullRecompute => self.full_recompute().await,
            RecomputeJob::RecomputeFrom(start) => self.recompute_from(start).await,
        }
    }
}

/// 집계 시간대 기준 어제 날짜.
pub fn previous_day(tz: &Tz) -> NaiveDate {
    let today = Utc::now().with_timezone(tz).date_naive();
    today.pred_opt().unwrap_or(today)
}

/// 벤치마크 일봉 수집 작업.
pub struct BenchmarkUpdateJob {
    updater: Arc<BenchmarkUpdater>,
    symbols: Vec<String>,
    timezone: Tz,
}

impl BenchmarkUpdateJob {
    pub fn new(updater: Arc<BenchmarkUpdater>, symbols: Vec<String>, timezone: Tz) -> Self {
        Self {
            updater,
            symbols,
            timezone,
        }
    }

    /// 지정 날짜의 일봉 수집.
    pub async fn run_for(&self, day: NaiveDate) -> RunStats {
        let report = self.updater.update_benchmarks(&self.symbols, day).await;
        RunStats {
            total: self.symbols.len(),
            success: report.succeeded,
            errors: report.failed.len(),
            rows_written: report.bars_written,
            ..RunStats::default()
        }
    }
}

#[async_trait]
impl DailyJob for BenchmarkUpdateJob {
    fn name(&self) -> &'static str {
        "update_benchmarks"
    }

    async fn run(&self) -> PortfolioResult<RunStats> {
        Ok(self.run_for(previous_day(&self.timezone)).await)
    }
}

/// 전체 재계산 작업. 일시적 실패는 재시도 정책에 따라 다시 시도합니다.
pub struct FullRecomputeJob {
    engine: Arc<RecomputeEngine>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl FullRecomputeJob {
    pub fn new(engine: Arc<RecomputeEngine>, retry: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            engine,
            retry,
            attempt_timeout,
        }
    }
}

#[async_trait]
impl DailyJob for FullRecomputeJob {
    fn name(&self) -> &'static str {
        "full_recompute"
    }

    async fn run(&self) -> PortfolioResult<RunStats> {
        let outcome = execute_job(
            self.engine.as_ref(),
            RecomputeJob::FullRecompute,
            &self.retry,
            self.attempt_timeout,
        )
        .await?;

        let mut stats = RunStats::new();
        stats.record_outcome(&outcome);
        Ok(stats)
    }
}
