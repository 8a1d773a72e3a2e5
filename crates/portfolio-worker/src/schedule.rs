//! 일일 스케줄러.
//!
//! 장 마감 후 두 개의 독립적인 일정으로 작업을 실행합니다:
//! - 벤치마크 일봉 수집 (기본 18:00)
//! - 전체 재계산 (기본 18:30)
//!
//! 두 일정은 서로 의존하지 않습니다. 벤치마크 수집이 실패해도 재계산은 예정대로
//! 실행되며, 그 경우 이전 벤치마크 데이터로 계산됩니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use portfolio_core::{job_span, PortfolioResult};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use crate::stats::RunStats;

/// 하루 한 번 실행되는 작업.
#[async_trait]
pub trait DailyJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> PortfolioResult<RunStats>;
}

/// 특정 시간대의 매일 같은 시각.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
    tz: Tz,
}

impl DailySchedule {
    pub fn new(time: NaiveTime, tz: Tz) -> Self {
        Self { time, tz }
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// `now` 이후(초과) 첫 실행 시각.
    ///
    /// DST로 존재하지 않는 현지 시각이면 한 시간 뒤로 밀고,
    /// 두 번 존재하는 시각이면 앞쪽을 사용합니다.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.tz).date_naive();

        (0..=2)
            .filter_map(|offset| today.checked_add_days(chrono::Days::new(offset)))
            .filter_map(|date| self.resolve_local(date.and_time(self.time)))
            .find(|candidate| *candidate > now)
            .unwrap_or_else(|| now + chrono::Duration::days(1))
    }

    /// 다음 실행까지 남은 시간.
    pub fn duration_until_next(&self, now: DateTime<Utc>) -> Duration {
        (self.next_run_after(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    fn resolve_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => self
                .tz
                .from_local_datetime(&(local + chrono::Duration::hours(1)))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// 일일 작업 스케줄러.
pub struct ScheduledJobService {
    jobs: Vec<(DailySchedule, Arc<dyn DailyJob>)>,
    job_timeout: Duration,
}

impl ScheduledJobService {
    pub fn new(job_timeout: Duration) -> Self {
        Self {
            jobs: Vec::new(),
            job_timeout,
        }
    }

    /// 일정 추가.
    pub fn add(mut self, schedule: DailySchedule, job: Arc<dyn DailyJob>) -> Self {
        self.jobs.push((schedule, job));
        self
    }

    /// 서비스 시작 (메인 루프).
    ///
    /// 일정마다 독립적인 타이머 task를 띄우고, 종료 신호를 받으면 모두 끝날 때까지 기다립니다.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut handles = Vec::with_capacity(self.jobs.len());

        for (schedule, job) in self.jobs {
            info!(
                job = job.name(),
                time = %schedule.time(),
                next_run = %schedule.next_run_after(Utc::now()),
                "일일 작업 등록"
            );
            handles.push(tokio::spawn(run_daily(
                schedule,
                job,
                self.job_timeout,
                shutdown.clone(),
            )));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "스케줄 task 비정상 종료");
            }
        }

        info!("ScheduledJobService 종료");
    }
}

async fn run_daily(
    schedule: DailySchedule,
    job: Arc<dyn DailyJob>,
    job_timeout: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let wait = schedule.duration_until_next(Utc::now());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                run_once(job.as_ref(), job_timeout)
                    .instrument(job_span!(job.name()))
                    .await;
            }
            _ = shutdown.cancelled() => {
                break;
            }
        }
    }
}

/// 작업 1회 실행. 실패는 로그만 남기고 다음 일정까지 기다립니다.
pub async fn run_once(job: &dyn DailyJob, job_timeout: Duration) -> Option<RunStats> {
    let started = std::time::Instant::now();

    match tokio::time::timeout(job_timeout, job.run()).await {
        Ok(Ok(mut stats)) => {
            stats.elapsed = started.elapsed();
            stats.log_summary(job.name());
            Some(stats)
        }
        Ok(Err(e)) => {
            error!(error = %e, "일일 작업 실패");
            None
        }
        Err(_) => {
            error!(timeout_secs = job_timeout.as_secs(), "일일 작업 시간 초과");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio_core::PortfolioError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn new_york() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_run_same_day() {
        let schedule = DailySchedule::new(hm(18, 0), new_york());
        // 2024-03-01 15:00 EST = 20:00 UTC
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();

        let next = schedule.next_run_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_rolls_to_next_day() {
        let schedule = DailySchedule::new(hm(18, 30), new_york());
        // 정확히 실행 시각이면 다음 날
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();

        let next = schedule.next_run_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 23, 30, 0).unwrap());
    }

    #[test]
    fn test_next_run_across_dst_change() {
        let schedule = DailySchedule::new(hm(18, 0), new_york());
        // 2024-03-10 DST 시작, 18:00 EDT = 22:00 UTC
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap();

        let next = schedule.next_run_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 10, 22, 0, 0).unwrap());
    }

    #[test]
    fn test_nonexistent_local_time_shifts_forward() {
        // 2024-03-10 02:30은 뉴욕에 존재하지 않음
        let schedule = DailySchedule::new(hm(2, 30), new_york());
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap();

        let next = schedule.next_run_after(now);
        // 03:30 EDT = 07:30 UTC
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap());
    }

    #[test]
    fn test_duration_until_next() {
        let schedule = DailySchedule::new(hm(18, 0), Tz::UTC);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 17, 0, 0).unwrap();
        assert_eq!(schedule.duration_until_next(now), Duration::from_secs(3_600));
    }

    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DailyJob for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> PortfolioResult<RunStats> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PortfolioError::DataSource("yahoo down".into()))
            } else {
                Ok(RunStats::new())
            }
        }
    }

    #[tokio::test]
    async fn test_run_once_reports_failure() {
        let job = CountingJob {
            runs: AtomicUsize::new(0),
            fail: true,
        };
        assert!(run_once(&job, Duration::from_secs(5)).await.is_none());
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        let job = CountingJob {
            runs: AtomicUsize::new(0),
            fail: false,
        };
        assert!(run_once(&job, Duration::from_secs(5)).await.is_some());
    }

    #[tokio::test]
    async fn test_service_stops_on_shutdown() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            fail: false,
        });
        let service = ScheduledJobService::new(Duration::from_secs(5))
            .add(DailySchedule::new(hm(18, 0), new_york()), job.clone())
            .add(DailySchedule::new(hm(18, 30), new_york()), job.clone());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(service.run(shutdown.clone()));
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
