//! 재계산 작업 큐와 워커.
//!
//! 수신 파이프라인은 [`JobQueue::schedule`]로 작업을 넣기만 하고 결과를 기다리지 않습니다.
//! [`RecomputeWorker`]는 작업마다 별도 task를 띄워 전체 실행 시간 제한과
//! 재시도 정책을 적용합니다. 작업 간에 메모리 상태를 공유하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use portfolio_analytics::RecomputeOutcome;
use portfolio_core::{job_span, PortfolioError, PortfolioResult};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use crate::retry::RetryPolicy;

/// 재계산 작업.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeJob {
    /// 최초 자산 날짜부터 전체 재계산
    FullRecompute,
    /// 지정 날짜부터 재계산
    RecomputeFrom(NaiveDate),
}

impl RecomputeJob {
    pub fn name(&self) -> &'static str {
        match self {
            RecomputeJob::FullRecompute => "full_recompute",
            RecomputeJob::RecomputeFrom(_) => "recompute_from",
        }
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        match self {
            RecomputeJob::FullRecompute => None,
            RecomputeJob::RecomputeFrom(date) => Some(*date),
        }
    }
}

/// 재계산 실행기.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: RecomputeJob) -> PortfolioResult<RecomputeOutcome>;
}

/// 작업 큐 송신 측.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<RecomputeJob>,
}

impl JobQueue {
    /// 용량이 제한된 큐 생성.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<RecomputeJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// 작업 예약. 대기하지 않으며, 큐가 가득 찼거나 닫혔으면 에러를 반환합니다.
    pub fn schedule(&self, job: RecomputeJob) -> PortfolioResult<()> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                PortfolioError::Internal(format!("작업 큐가 가득 참: {:?}", job))
            }
            mpsc::error::TrySendError::Closed(job) => {
                PortfolioError::Internal(format!("작업 큐가 닫힘: {:?}", job))
            }
        })
    }
}

/// 작업 1회 실행: 시도마다 시간 제한을 걸고 재시도 정책을 적용합니다.
///
/// 시간 초과는 재시도 가능한 실패로 취급합니다.
pub async fn execute_job(
    runner: &dyn JobRunner,
    job: RecomputeJob,
    retry: &RetryPolicy,
    timeout: Duration,
) -> PortfolioResult<RecomputeOutcome> {
    retry
        .run(job.name(), |attempt| async move {
            match tokio::time::timeout(timeout, runner.run(job)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(attempt, timeout_secs = timeout.as_secs(), "작업 시간 초과");
                    Err(PortfolioError::Timeout(format!(
                        "{} {}초 초과",
                        job.name(),
                        timeout.as_secs()
                    )))
                }
            }
        })
        .await
}

/// 큐에서 작업을 꺼내 실행하는 워커.
pub struct RecomputeWorker {
    runner: Arc<dyn JobRunner>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl RecomputeWorker {
    pub fn new(runner: Arc<dyn JobRunner>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            runner,
            retry,
            timeout,
        }
    }

    /// 워커 루프.
    ///
    /// 큐가 닫히거나 종료 신호를 받으면 새 작업을 받지 않고, 진행 중인 작업이 끝날 때까지 기다립니다.
    /// 처리한 작업 수를 반환합니다.
    pub async fn run(
        self,
        mut rx: mpsc::Receiver<RecomputeJob>,
        shutdown: CancellationToken,
    ) -> usize {
        let mut tasks = JoinSet::new();
        let mut received = 0usize;

        loop {
            tokio::select! {
                job = rx.recv() => {
                    let Some(job) = job else { break };
                    received += 1;

                    let runner = self.runner.clone();
                    let retry = self.retry;
                    let timeout = self.timeout;
                    let span = match job.start_date() {
                        Some(start) => job_span!(job.name(), start),
                        None => job_span!(job.name()),
                    };

                    tasks.spawn(
                        async move {
                            match execute_job(runner.as_ref(), job, &retry, timeout).await {
                                Ok(outcome) => {
                                    info!(days_written = outcome.days_written(), "작업 완료");
                                }
                                Err(e) => {
                                    // 이벤트는 버려지며 다음 작업 처리는 계속됩니다.
                                    error!(error = %e, "작업 실패, 이벤트 폐기");
                                }
                            }
                        }
                        .instrument(span),
                    );
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "작업 task 비정상 종료");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("워커 종료 신호 수신");
                    break;
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "작업 task 비정상 종료");
            }
        }

        info!(received, "재계산 워커 종료");
        received
    }
}
