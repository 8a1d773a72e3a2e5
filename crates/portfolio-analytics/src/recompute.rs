//! 분석 재계산 오케스트레이터.
//!
//! 두 개의 진입점이 하나의 핵심 절차를 사용합니다:
//!
//! - [`RecomputeEngine::full_recompute`]: 가장 오래된 자산 날짜부터 재계산
//! - [`RecomputeEngine::recompute_from`]: 지정 날짜부터 재계산
//!
//! 누적 수익률과 롤링 윈도우가 올바른 기준을 갖도록 항상 전체 이력을 읽어 계산하고,
//! 기록은 시작 날짜 이후로 제한합니다. 기록은 하나의 원자적 배치입니다.
//!
//! 재시도는 이 모듈의 책임이 아닙니다. 실패는 그대로 호출자(트리거 어댑터)에게 전파됩니다.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use portfolio_core::{
    finite, AnalyticsConfig, AnalyticsRecord, PortfolioResult, MIN_DAILY_POINTS,
    RISK_ADJUSTED_WINDOW, RISK_FREE_RATE, VOLATILITY_WINDOW,
};
use serde::Serialize;

use crate::alignment::{DailyEquitySeries, DailyReturnSeries, DateSeries, SeriesAligner};
use crate::broker::{BroadcastMessage, SharedBroker};
use crate::performance::{
    cumulative_returns, daily_returns, max_drawdown, rolling_beta_alpha, rolling_sharpe,
    rolling_volatility, BetaAlpha,
};
use crate::store::AnalyticsStore;

/// 재계산 설정.
#[derive(Debug, Clone)]
pub struct RecomputeSettings {
    /// 베타/알파 기준 벤치마크 심볼
    pub benchmark_symbol: String,
    /// 일별 집계 시간대
    pub timezone: Tz,
}

impl RecomputeSettings {
    pub fn from_config(config: &AnalyticsConfig) -> PortfolioResult<Self> {
        Ok(Self {
            benchmark_symbol: config.default_benchmark.trim().to_uppercase(),
            timezone: config.tz()?,
        })
    }
}

impl Default for RecomputeSettings {
    fn default() -> Self {
        Self {
            benchmark_symbol: "SPY".to_string(),
            timezone: chrono_tz::America::New_York,
        }
    }
}

/// 재계산 1회의 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecomputeOutcome {
    /// 자산 데이터가 전혀 없음
    NoEquityData,
    /// 일별 데이터가 2개 미만
    InsufficientData { daily_points: usize },
    /// 기록 완료
    Completed(RecomputeSummary),
}

impl RecomputeOutcome {
    /// 기록된 날짜 수.
    pub fn days_written(&self) -> usize {
        match self {
            RecomputeOutcome::Completed(summary) => summary.days_written,
            _ => 0,
        }
    }
}

/// 완료된 재계산 요약.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecomputeSummary {
    pub start_date: NaiveDate,
    /// 전체 일별 데이터 수
    pub total_days: usize,
    /// 기록한 날짜 수 (시작 날짜 이후)
    pub days_written: usize,
    /// 포트폴리오와 정렬된 벤치마크 관측값 수
    pub benchmark_points: usize,
    /// 베타/알파 계산 여부
    pub beta_computed: bool,
    /// 이번 패스의 최대 낙폭
    pub max_drawdown: Option<f64>,
}

/// 순수 계산 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedPass {
    /// 시작 날짜 이후의 레코드 (날짜순)
    pub records: Vec<AnalyticsRecord>,
    pub benchmark_points: usize,
    pub beta_computed: bool,
    pub max_drawdown: Option<f64>,
}

/// 일별 자산과 벤치마크 수익률로 분석 레코드를 계산합니다.
///
/// 모든 지표는 전체 일별 시계열에 대해 계산되며, `start` 이전 날짜는 결과에서만 제외됩니다.
/// 최대 낙폭은 전체 시계열의 단일 값으로 이번 패스의 모든 레코드에 동일하게 기록됩니다.
/// 정렬된 벤치마크 관측값이 60개 미만이면 베타/알파는 모두 `None`입니다.
pub fn compute_pass(
    daily: &DailyEquitySeries,
    benchmark_returns: &DailyReturnSeries,
    start: NaiveDate,
) -> ComputedPass {
    let values = daily.values();
    let baseline = values.first().copied().unwrap_or(0.0);

    let returns = daily_returns(values);
    let cumulative = cumulative_returns(values, baseline);
    let mdd = finite(max_drawdown(values));
    let volatility = rolling_volatility(&returns, VOLATILITY_WINDOW, true);
    let sharpe = rolling_sharpe(&returns, RISK_ADJUSTED_WINDOW, RISK_FREE_RATE);

    let return_series = daily.with_values(returns.clone());
    let (benchmark_points, beta_by_date) = beta_alpha_by_date(&return_series, benchmark_returns);
    let beta_computed = !beta_by_date.is_empty();

    let records = daily
        .iter()
        .enumerate()
        .filter(|(_, (date, _))| *date >= start)
        .map(|(i, (date, &equity))| {
            let beta_alpha = beta_by_date.get(&date);
            AnalyticsRecord {
                date,
                total_equity: equity,
                daily_return: finite(returns[i]),
                cumulative_return: finite(cumulative[i]),
                max_drawdown: mdd,
                volatility_20d: finite(volatility[i]),
                sharpe_60d: finite(sharpe[i]),
                beta_60d: finite(beta_alpha.map(|ba| ba.beta)),
                alpha_60d: finite(beta_alpha.map(|ba| ba.alpha)),
            }
        })
        .collect();

    ComputedPass {
        records,
        benchmark_points,
        beta_computed,
        max_drawdown: mdd,
    }
}

/// 포트폴리오/벤치마크 수익률을 정렬하고 날짜별 베타/알파를 계산합니다.
///
/// 한쪽이라도 수익률이 없는 날짜는 제외합니다.
fn beta_alpha_by_date(
    portfolio: &DailyReturnSeries,
    benchmark: &DailyReturnSeries,
) -> (usize, HashMap<NaiveDate, BetaAlpha>) {
    let (p, b) = SeriesAligner::align(portfolio, benchmark);

    let paired: DateSeries<(f64, f64)> = DateSeries::from_pairs(
        p.iter()
            .zip(b.values())
            .filter_map(|((date, pr), br)| Some((date, ((*pr)?, (*br)?)))),
    );

    if paired.len() < RISK_ADJUSTED_WINDOW {
        return (paired.len(), HashMap::new());
    }

    let (p_values, b_values): (Vec<f64>, Vec<f64>) = paired.values().iter().copied().unzip();
    let rolling = rolling_beta_alpha(&p_values, &b_values, RISK_ADJUSTED_WINDOW);

    let by_date = paired
        .dates()
        .iter()
        .zip(rolling)
        .filter_map(|(date, ba)| ba.map(|ba| (*date, ba)))
        .collect();

    (paired.len(), by_date)
}

/// 재계산 엔진.
pub struct RecomputeEngine {
    store: Arc<dyn AnalyticsStore>,
    settings: RecomputeSettings,
    broker: Option<SharedBroker>,
}

impl RecomputeEngine {
    pub fn new(store: Arc<dyn AnalyticsStore>, settings: RecomputeSettings) -> Self {
        Self {
            store,
            settings,
            broker: None,
        }
    }

    /// 완료 시 `analytics_update`를 발행할 브로커를 연결합니다.
    pub fn with_broker(mut self, broker: SharedBroker) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn settings(&self) -> &RecomputeSettings {
        &self.settings
    }

    /// 전체 이력 재계산.
    pub async fn full_recompute(&self) -> PortfolioResult<RecomputeOutcome> {
        let Some(earliest) = self.store.earliest_equity_time().await? else {
            tracing::info!("자산 데이터 없음, 재계산 생략");
            return Ok(RecomputeOutcome::NoEquityData);
        };

        let start = earliest.with_timezone(&self.settings.timezone).date_naive();
        self.recompute_from(start).await
    }

    /// `start` 이후 날짜의 분석 레코드를 재계산합니다.
    ///
    /// 같은 입력으로 두 번 실행하면 같은 레코드가 기록됩니다.
    pub async fn recompute_from(&self, start: NaiveDate) -> PortfolioResult<RecomputeOutcome> {
        // 누적 수익률 기준과 윈도우 문맥을 위해 항상 전체 이력을 읽음
        let snapshots = self.store.load_equity_history(None).await?;
        if snapshots.is_empty() {
            tracing::warn!(%start, "자산 데이터 없음, 재계산 생략");
            return Ok(RecomputeOutcome::NoEquityData);
        }

        let daily = SeriesAligner::to_daily_series(&snapshots, &self.settings.timezone);
        if daily.len() < MIN_DAILY_POINTS {
            tracing::warn!(
                %start,
                daily_points = daily.len(),
                "일별 데이터 부족, 재계산 생략"
            );
            return Ok(RecomputeOutcome::InsufficientData {
                daily_points: daily.len(),
            });
        }

        let benchmark = match daily.first_date() {
            Some(first) => {
                self.store
                    .load_benchmark_returns(&self.settings.benchmark_symbol, first)
                    .await?
            }
            None => DailyReturnSeries::default(),
        };

        let pass = compute_pass(&daily, &benchmark, start);
        if !pass.beta_computed {
            tracing::info!(
                benchmark = %self.settings.benchmark_symbol,
                aligned_points = pass.benchmark_points,
                required = RISK_ADJUSTED_WINDOW,
                "벤치마크 데이터 부족, 베타/알파 생략"
            );
        }

        let days_written = if pass.records.is_empty() {
            0
        } else {
            self.store.upsert_analytics(&pass.records).await?
        };

        tracing::info!(
            %start,
            total_days = daily.len(),
            days_written,
            max_drawdown = ?pass.max_drawdown,
            "분석 재계산 완료"
        );

        if let (Some(broker), Some(latest)) = (&self.broker, pass.records.last()) {
            broker.publish(BroadcastMessage::analytics_update(latest));
        }

        Ok(RecomputeOutcome::Completed(RecomputeSummary {
            start_date: start,
            total_days: daily.len(),
            days_written,
            benchmark_points: pass.benchmark_points,
            beta_computed: pass.beta_computed,
            max_drawdown: pass.max_drawdown,
        }))
    }
}
