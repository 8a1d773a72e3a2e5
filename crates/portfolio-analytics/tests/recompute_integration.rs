//! 재계산 엔진 통합 테스트
//!
//! 메모리 저장소로 전체 재계산 흐름(로드 → 일별 변환 → 계산 → upsert)을 검증합니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use portfolio_analytics::{
    create_broker, AnalyticsStore, MessageKind, RecomputeEngine, RecomputeOutcome,
    RecomputeSettings,
};
use portfolio_core::{
    AnalyticsRecord, BenchmarkBar, EquitySnapshot, PortfolioError, PortfolioResult,
};

/// 테스트용 메모리 저장소
#[derive(Default)]
struct MemoryStore {
    equity: Mutex<Vec<EquitySnapshot>>,
    benchmarks: Mutex<HashMap<String, Vec<BenchmarkBar>>>,
    analytics: Mutex<BTreeMap<NaiveDate, AnalyticsRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    fn with_equity(snapshots: Vec<EquitySnapshot>) -> Self {
        let store = Self::default();
        *store.equity.lock().unwrap() = snapshots;
        store
    }

    fn set_benchmark(&self, symbol: &str, bars: Vec<BenchmarkBar>) {
        self.benchmarks
            .lock()
            .unwrap()
            .insert(symbol.to_string(), bars);
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn earliest_equity_time(&self) -> PortfolioResult<Option<DateTime<Utc>>> {
        Ok(self.equity.lock().unwrap().iter().map(|s| s.time).min())
    }

    async fn load_equity_history(
        &self,
        from: Option<DateTime<Utc>>,
    ) -> PortfolioResult<Vec<EquitySnapshot>> {
        let mut snapshots: Vec<EquitySnapshot> = self
            .equity
            .lock()
            .unwrap()
            .iter()
            .filter(|s| from.map_or(true, |f| s.time >= f))
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.time);
        Ok(snapshots)
    }

    async fn load_benchmark_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> PortfolioResult<Vec<BenchmarkBar>> {
        Ok(self
            .benchmarks
            .lock()
            .unwrap()
            .get(symbol)
            .map(|bars| bars.iter().filter(|b| b.date >= from).cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_analytics(&self, records: &[AnalyticsRecord]) -> PortfolioResult<usize> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortfolioError::Database("connection reset".to_string()));
        }
        let mut analytics = self.analytics.lock().unwrap();
        for record in records {
            analytics.insert(record.date, record.clone());
        }
        Ok(records.len())
    }

    async fn load_analytics(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> PortfolioResult<Vec<AnalyticsRecord>> {
        Ok(self
            .analytics
            .lock()
            .unwrap()
            .values()
            .filter(|r| from.map_or(true, |f| r.date >= f) && to.map_or(true, |t| r.date <= t))
            .cloned()
            .collect())
    }
}

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
}

/// UTC 기준 날짜의 특정 시각 스냅샷
fn snapshot_at(offset: i64, hour: u32, equity: f64) -> EquitySnapshot {
    let date = day(offset);
    let time = Utc
        .from_utc_datetime(&date.and_hms_opt(hour, 0, 0).unwrap());
    EquitySnapshot::new(time, equity)
}

fn utc_settings() -> RecomputeSettings {
    RecomputeSettings {
        benchmark_symbol: "SPY".to_string(),
        timezone: chrono_tz::Tz::UTC,
    }
}

/// 결정적인 진동 자산 곡선
fn wavy_equity(days: i64) -> Vec<EquitySnapshot> {
    (0..days)
        .map(|i| {
            let wiggle = ((i * 7 % 11) as f64 - 5.0) * 150.0;
            snapshot_at(i, 16, 100_000.0 + i as f64 * 40.0 + wiggle)
        })
        .collect()
}

fn spy_bars(days: i64) -> Vec<BenchmarkBar> {
    (0..days)
        .map(|i| BenchmarkBar {
            symbol: "SPY".to_string(),
            date: day(i),
            close: 470.0 + i as f64 * 0.3 + ((i * 5 % 7) as f64 - 3.0),
        })
        .collect()
}

#[tokio::test]
async fn test_cumulative_return_scenario_with_intraday_snapshots() {
    let store = Arc::new(MemoryStore::with_equity(vec![
        snapshot_at(0, 10, 99_500.0),
        snapshot_at(0, 20, 100_000.0),
        snapshot_at(1, 20, 101_000.0),
        snapshot_at(2, 14, 98_000.0),
        snapshot_at(2, 21, 99_000.0),
        snapshot_at(3, 20, 103_000.0),
    ]));
    let engine = RecomputeEngine::new(store.clone(), utc_settings());

    let outcome = engine.full_recompute().await.unwrap();
    assert_eq!(outcome.days_written(), 4);

    let records = store.load_analytics(None, None).await.unwrap();
    let expected = [0.0, 0.01, -0.01, 0.03];
    for (record, expected) in records.iter().zip(expected) {
        assert!((record.cumulative_return.unwrap() - expected).abs() < 1e-12);
    }
    assert_eq!(records[0].total_equity, 100_000.0);
    assert_eq!(records[0].daily_return, Some(0.0));
    // 101000 → 99000 하락
    let mdd = records[0].max_drawdown.unwrap();
    assert!((mdd - (-2_000.0 / 101_000.0)).abs() < 1e-12);
    assert!(records.iter().all(|r| r.max_drawdown == Some(mdd)));
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let store = Arc::new(MemoryStore::with_equity(wavy_equity(90)));
    store.set_benchmark("SPY", spy_bars(90));
    let engine = RecomputeEngine::new(store.clone(), utc_settings());

    engine.recompute_from(day(30)).await.unwrap();
    let first = store.load_analytics(Some(day(30)), None).await.unwrap();

    engine.recompute_from(day(30)).await.unwrap();
    let second = store.load_analytics(Some(day(30)), None).await.unwrap();

    assert_eq!(first.len(), 60);
    assert_eq!(first, second);
    // 60일 윈도우를 위해 시작 이전 이력도 사용
    assert!(first[29].sharpe_60d.is_some());
    assert!(first[29].beta_60d.is_some());
    assert!(first[28].sharpe_60d.is_none());
}

#[tokio::test]
async fn test_recompute_from_writes_only_later_dates() {
    let store = Arc::new(MemoryStore::with_equity(wavy_equity(10)));
    let engine = RecomputeEngine::new(store.clone(), utc_settings());

    let outcome = engine.recompute_from(day(6)).await.unwrap();

    let records = store.load_analytics(None, None).await.unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].date, day(6));
    match outcome {
        RecomputeOutcome::Completed(summary) => {
            assert_eq!(summary.total_days, 10);
            assert_eq!(summary.days_written, 4);
            assert!(!summary.beta_computed);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // 누적 수익률은 구간 시작이 아니라 최초 자산 기준
    let inception = store.equity.lock().unwrap()[0].equity;
    let expected = records[0].total_equity / inception - 1.0;
    assert!((records[0].cumulative_return.unwrap() - expected).abs() < 1e-12);
}

#[tokio::test]
async fn test_upsert_overwrites_every_field() {
    let store = Arc::new(MemoryStore::with_equity(wavy_equity(5)));
    let stale = AnalyticsRecord {
        date: day(4),
        total_equity: 1.0,
        daily_return: Some(9.9),
        cumulative_return: Some(9.9),
        max_drawdown: Some(-0.9),
        volatility_20d: Some(0.5),
        sharpe_60d: Some(3.0),
        beta_60d: Some(1.5),
        alpha_60d: Some(0.2),
    };
    store.analytics.lock().unwrap().insert(day(4), stale);

    let engine = RecomputeEngine::new(store.clone(), utc_settings());
    engine.recompute_from(day(4)).await.unwrap();

    let record = store.load_analytics(Some(day(4)), Some(day(4))).await.unwrap();
    assert_eq!(record.len(), 1);
    let record = &record[0];
    assert_ne!(record.total_equity, 1.0);
    // 윈도우 미충족 필드는 이전 값이 남지 않고 None
    assert_eq!(record.volatility_20d, None);
    assert_eq!(record.sharpe_60d, None);
    assert_eq!(record.beta_60d, None);
    assert_eq!(record.alpha_60d, None);
}

#[tokio::test]
async fn test_no_equity_data_is_noop() {
    let store = Arc::new(MemoryStore::default());
    let engine = RecomputeEngine::new(store.clone(), utc_settings());

    assert_eq!(
        engine.full_recompute().await.unwrap(),
        RecomputeOutcome::NoEquityData
    );
    assert_eq!(
        engine.recompute_from(day(0)).await.unwrap(),
        RecomputeOutcome::NoEquityData
    );
    assert!(store.load_analytics(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_day_is_insufficient() {
    let store = Arc::new(MemoryStore::with_equity(vec![
        snapshot_at(0, 10, 100.0),
        snapshot_at(0, 15, 101.0),
    ]));
    let engine = RecomputeEngine::new(store.clone(), utc_settings());

    let outcome = engine.full_recompute().await.unwrap();
    assert_eq!(outcome, RecomputeOutcome::InsufficientData { daily_points: 1 });
    assert!(store.load_analytics(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_failure_propagates_without_partial_writes() {
    let store = Arc::new(MemoryStore::with_equity(wavy_equity(5)));
    store.fail_writes.store(true, Ordering::SeqCst);
    let engine = RecomputeEngine::new(store.clone(), utc_settings());

    let err = engine.full_recompute().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(store.load_analytics(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_beta_gated_by_benchmark_coverage() {
    let store = Arc::new(MemoryStore::with_equity(wavy_equity(80)));
    store.set_benchmark("SPY", spy_bars(50));
    let engine = RecomputeEngine::new(store.clone(), utc_settings());

    engine.full_recompute().await.unwrap();
    let records = store.load_analytics(None, None).await.unwrap();
    assert!(records.iter().all(|r| r.beta_60d.is_none() && r.alpha_60d.is_none()));
    // 샤프는 벤치마크와 무관
    assert!(records[79].sharpe_60d.is_some());

    store.set_benchmark("SPY", spy_bars(80));
    engine.full_recompute().await.unwrap();
    let records = store.load_analytics(None, None).await.unwrap();
    assert!(records[58].beta_60d.is_none());
    assert!(records[59].beta_60d.is_some());
    assert!(records[79].alpha_60d.is_some());
}

#[tokio::test]
async fn test_completed_pass_publishes_latest_record() {
    let store = Arc::new(MemoryStore::with_equity(wavy_equity(3)));
    let broker = create_broker(8);
    let mut rx = broker.register("dashboard", &["analytics".to_string()]).await;

    let engine = RecomputeEngine::new(store, utc_settings()).with_broker(broker.clone());
    engine.full_recompute().await.unwrap();

    let message = broker.next_for("dashboard", &mut rx).await.unwrap();
    assert_eq!(message.kind, MessageKind::AnalyticsUpdate);
    assert_eq!(message.data["date"], "2024-01-03");
}
