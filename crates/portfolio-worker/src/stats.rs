//! 작업 실행 통계.

use std::time::Duration;

use portfolio_analytics::RecomputeOutcome;
use serde::{Deserialize, Serialize};

/// 작업 실행 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// 총 실행 단위 (작업 또는 심볼)
    pub total: usize,
    /// 성공 횟수
    pub success: usize,
    /// 에러 횟수
    pub errors: usize,
    /// 건너뛴 횟수 (데이터 없음/부족)
    pub skipped: usize,
    /// 기록된 분석 일수 또는 일봉 수
    pub rows_written: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 재계산 결과 반영.
    pub fn record_outcome(&mut self, outcome: &RecomputeOutcome) {
        self.total += 1;
        match outcome {
            RecomputeOutcome::Completed(summary) => {
                self.success += 1;
                self.rows_written += summary.days_written;
            }
            RecomputeOutcome::NoEquityData | RecomputeOutcome::InsufficientData { .. } => {
                self.skipped += 1;
            }
        }
    }

    pub fn record_error(&mut self) {
        self.total += 1;
        self.errors += 1;
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            skipped = self.skipped,
            rows_written = self.rows_written,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "작업 완료"
        );
    }
}
