//! 포트폴리오 분석 엔진 워커.
//!
//! 이 crate는 재계산을 실행시키는 트리거 계층을 제공합니다:
//! - 이벤트 트리거: 수신 이벤트 저장 후 해당 날짜부터 재계산 예약 (작업 큐 + 재시도)
//! - 시간 트리거: 장 마감 후 벤치마크 수집과 전체 재계산 (독립된 두 일정)
//! - CLI 바이너리 (`portfolio-worker`)

pub mod ingest;
pub mod jobs;
pub mod queue;
pub mod retry;
pub mod schedule;
pub mod stats;

pub use ingest::{EventIngestor, IngestOutcome};
pub use jobs::{previous_day, BenchmarkUpdateJob, FullRecomputeJob};
pub use queue::{execute_job, JobQueue, JobRunner, RecomputeJob, RecomputeWorker};
pub use retry::RetryPolicy;
pub use schedule::{run_once, DailyJob, DailySchedule, ScheduledJobService};
pub use stats::RunStats;
