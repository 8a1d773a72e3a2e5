//! 지수 백오프 재시도 정책.

use std::future::Future;
use std::time::Duration;

use portfolio_core::{PortfolioResult, RetryConfig};
use tracing::{error, warn};

/// 재시도 정책.
///
/// `attempt`번째 시도가 실패하면 `base_delay × 2^(attempt-1)` 후에 다음 시도를 합니다.
/// 재시도 가능한 에러([`portfolio_core::PortfolioError::is_retryable`])만 재시도합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }

    /// `attempt`번째 시도가 실패한 뒤의 대기 시간.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// 작업을 정책에 따라 실행합니다.
    ///
    /// `op`는 1부터 시작하는 시도 번호를 받습니다. 재시도 불가 에러이거나
    /// 시도 횟수를 모두 쓰면 마지막 에러를 반환합니다.
    pub async fn run<T, F, Fut>(&self, job: &str, mut op: F) -> PortfolioResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PortfolioResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        job,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "작업 실패, 재시도 예정"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!(job, attempts = attempt, error = %e, "재시도 횟수 소진");
                    } else {
                        error!(job, attempt, error = %e, "재시도 불가 에러");
                    }
                    return Err(e);
                }
            }
        }
    }
}
