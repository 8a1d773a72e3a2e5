//! Portfolio analytics worker CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use portfolio_analytics::{create_broker, RecomputeEngine, RecomputeSettings};
use portfolio_core::{init_logging, job_span, EngineConfig, LogConfig, LogFormat};
use portfolio_data::{BenchmarkUpdater, Database, PgAnalyticsStore, YahooBenchmarkFetcher};
use portfolio_worker::{
    execute_job, previous_day, BenchmarkUpdateJob, DailySchedule, EventIngestor, FullRecomputeJob,
    JobQueue, RecomputeJob, RecomputeWorker, RetryPolicy, RunStats, ScheduledJobService,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[derive(Parser)]
#[command(name = "portfolio-worker")]
#[command(about = "Portfolio analytics recompute worker", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (없으면 기본값 + 환경 변수)
    #[arg(long, default_value = "config/portfolio.toml")]
    config: PathBuf,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 로그 형식 (pretty, json, compact). 없으면 LOG_FORMAT
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// 작업 span 진입/종료 로그 출력 (LOG_SPAN_EVENTS와 같음)
    #[arg(long)]
    log_span_events: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 데이터베이스 마이그레이션 실행
    Migrate,

    /// 최초 자산 날짜부터 전체 재계산
    RecomputeAll,

    /// 지정 날짜부터 재계산
    RecomputeFrom {
        /// 시작 날짜 (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },

    /// 벤치마크 일봉 수집 (기본: 어제)
    UpdateBenchmarks {
        /// 수집 날짜 (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// 특정 심볼만 수집 (쉼표로 구분, 예: "SPY,QQQ")
        #[arg(long)]
        symbols: Option<String>,
    },

    /// 벤치마크 과거 일봉 백필
    BackfillBenchmark {
        /// 심볼 (기본: 설정의 기본 벤치마크)
        #[arg(long)]
        symbol: Option<String>,

        /// 과거 일수 (기본: 설정값)
        #[arg(long)]
        days: Option<i64>,
    },

    /// 이벤트 파일(NDJSON) 처리 후 재계산까지 완료
    Ingest {
        /// 이벤트 파일 경로 ("-"이면 표준 입력)
        #[arg(long, default_value = "-")]
        file: String,
    },

    /// 데몬 모드: 일일 스케줄 + 재계산 워커
    Daemon {
        /// 표준 입력에서 NDJSON 이벤트 수신
        #[arg(long)]
        events_stdin: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 로깅 초기화
    let default_level = format!(
        "portfolio_worker={level},portfolio_analytics={level},portfolio_data={level},portfolio_core={level}",
        level = cli.log_level
    );
    let mut log_config = LogConfig::from_env(&default_level);
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    log_config.with_span_events |= cli.log_span_events;
    init_logging(&log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Portfolio analytics worker 시작");

    // 설정 로드
    let config = EngineConfig::load(&cli.config)?;
    let tz = config.analytics.tz()?;
    tracing::debug!(
        config = %cli.config.display(),
        timezone = %tz,
        benchmark = %config.analytics.default_benchmark,
        "설정 로드 완료"
    );

    // DB 연결
    let db = Database::connect(&config.database_url()?, &config.database).await?;

    let store = Arc::new(PgAnalyticsStore::new(&db));
    let broker = create_broker(1024);
    let settings = RecomputeSettings::from_config(&config.analytics)?;
    let engine = Arc::new(RecomputeEngine::new(store.clone(), settings).with_broker(broker.clone()));
    let retry = RetryPolicy::from_config(&config.retry);
    let job_timeout = config.worker.job_timeout();

    let benchmark_updater = || -> anyhow::Result<Arc<BenchmarkUpdater>> {
        let fetcher = YahooBenchmarkFetcher::new(tz)?;
        Ok(Arc::new(BenchmarkUpdater::new(
            Arc::new(fetcher),
            store.clone(),
            config.benchmarks.request_delay(),
        )))
    };

    // 명령 실행
    match cli.command {
        Commands::Migrate => {
            db.migrate().await?;
        }
        Commands::RecomputeAll => {
            run_recompute(&engine, RecomputeJob::FullRecompute, &retry, job_timeout).await?;
        }
        Commands::RecomputeFrom { date } => {
            run_recompute(&engine, RecomputeJob::RecomputeFrom(date), &retry, job_timeout).await?;
        }
        Commands::UpdateBenchmarks { date, symbols } => {
            let symbols = match symbols {
                Some(list) => list
                    .split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect(),
                None => config.benchmarks.symbol_list(),
            };
            let day = date.unwrap_or_else(|| previous_day(&tz));

            let started = Instant::now();
            let job = BenchmarkUpdateJob::new(benchmark_updater()?, symbols, tz);
            let mut stats = job.run_for(day).instrument(job_span!("update_benchmarks", day)).await;
            stats.elapsed = started.elapsed();
            stats.log_summary("벤치마크 수집");
        }
        Commands::BackfillBenchmark { symbol, days } => {
            let symbol = symbol
                .map(|s| s.trim().to_uppercase())
                .unwrap_or_else(|| config.analytics.default_benchmark.clone());
            let days = days.unwrap_or(config.benchmarks.backfill_days);
            let today = chrono::Utc::now().with_timezone(&tz).date_naive();

            let started = Instant::now();
            let written = benchmark_updater()?
                .backfill_benchmark(&symbol, days, today)
                .instrument(job_span!("backfill_benchmark"))
                .await?;

            let stats = RunStats {
                total: 1,
                success: 1,
                rows_written: written,
                elapsed: started.elapsed(),
                ..RunStats::default()
            };
            stats.log_summary("벤치마크 백필");
        }
        Commands::Ingest { file } => {
            let (queue, rx) = JobQueue::bounded(config.worker.queue_capacity);
            let worker = RecomputeWorker::new(engine.clone(), retry, job_timeout);
            let worker_handle = tokio::spawn(worker.run(rx, CancellationToken::new()));

            let ingestor = EventIngestor::new(store.clone(), queue, tz).with_broker(broker.clone());
            let started = Instant::now();
            let mut stats = if file == "-" {
                ingest_lines(&ingestor, BufReader::new(tokio::io::stdin())).await?
            } else {
                let handle = tokio::fs::File::open(&file)
                    .await
                    .with_context(|| format!("이벤트 파일 열기 실패: {}", file))?;
                ingest_lines(&ingestor, BufReader::new(handle)).await?
            };
            stats.elapsed = started.elapsed();
            stats.log_summary("이벤트 수신");

            // 송신 측을 닫아 워커가 남은 작업을 처리하고 종료하도록 함
            drop(ingestor);
            let processed = worker_handle.await?;
            tracing::info!(processed, "재계산 작업 처리 완료");
        }
        Commands::Daemon { events_stdin } => {
            tracing::info!(
                benchmark_update = %config.schedule.benchmark_update,
                full_recompute = %config.schedule.full_recompute,
                timezone = %tz,
                "=== 데몬 모드 시작 ==="
            );

            let shutdown = CancellationToken::new();

            let (queue, rx) = JobQueue::bounded(config.worker.queue_capacity);
            let worker = RecomputeWorker::new(engine.clone(), retry, job_timeout);
            let worker_handle = tokio::spawn(worker.run(rx, shutdown.clone()));

            let benchmark_job = Arc::new(BenchmarkUpdateJob::new(
                benchmark_updater()?,
                config.benchmarks.symbol_list(),
                tz,
            ));
            let recompute_job = Arc::new(FullRecomputeJob::new(engine.clone(), retry, job_timeout));

            // 재시도까지 포함한 일일 작업 전체 시간 제한
            let daily_timeout = job_timeout * (retry.max_attempts + 1);
            let service = ScheduledJobService::new(daily_timeout)
                .add(
                    DailySchedule::new(config.schedule.benchmark_update_time()?, tz),
                    benchmark_job,
                )
                .add(
                    DailySchedule::new(config.schedule.full_recompute_time()?, tz),
                    recompute_job,
                );
            let service_handle = tokio::spawn(service.run(shutdown.clone()));

            let ingest_handle = if events_stdin {
                let ingestor = EventIngestor::new(store.clone(), queue, tz).with_broker(broker.clone());
                let shutdown = shutdown.clone();
                Some(tokio::spawn(async move {
                    tokio::select! {
                        result = ingest_lines(&ingestor, BufReader::new(tokio::io::stdin())) => {
                            match result {
                                Ok(stats) => stats.log_summary("이벤트 수신"),
                                Err(e) => tracing::error!(error = %e, "이벤트 입력 처리 실패"),
                            }
                        }
                        _ = shutdown.cancelled() => {}
                    }
                }))
            } else {
                drop(queue);
                None
            };

            tokio::signal::ctrl_c().await?;
            tracing::info!("종료 신호 수신, 데몬 종료 중...");
            shutdown.cancel();

            if let Some(handle) = ingest_handle {
                handle.await?;
            }
            service_handle.await?;
            worker_handle.await?;
        }
    }

    db.pool().close().await;
    tracing::info!("Portfolio analytics worker 종료");

    Ok(())
}

/// 재계산 1회 실행 (재시도 포함) 후 통계 출력.
async fn run_recompute(
    engine: &Arc<RecomputeEngine>,
    job: RecomputeJob,
    retry: &RetryPolicy,
    timeout: std::time::Duration,
) -> anyhow::Result<()> {
    let span = match job.start_date() {
        Some(start) => job_span!(job.name(), start),
        None => job_span!(job.name()),
    };

    let started = Instant::now();
    let mut stats = RunStats::new();
    let result = execute_job(engine.as_ref(), job, retry, timeout)
        .instrument(span)
        .await;

    match &result {
        Ok(outcome) => stats.record_outcome(outcome),
        Err(_) => stats.record_error(),
    }
    stats.elapsed = started.elapsed();
    stats.log_summary(job.name());

    result?;
    Ok(())
}

/// 한 줄에 하나씩 JSON 이벤트를 처리합니다. 잘못된 이벤트는 건너뜁니다.
async fn ingest_lines<R>(ingestor: &EventIngestor, reader: R) -> anyhow::Result<RunStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = RunStats::new();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        stats.total += 1;
        match ingestor.ingest_json(line).await {
            Ok(outcome) if outcome.stored => stats.success += 1,
            Ok(_) => stats.skipped += 1,
            Err(e) => {
                stats.errors += 1;
                tracing::warn!(error = %e, "이벤트 처리 실패");
            }
        }
    }

    Ok(stats)
}
