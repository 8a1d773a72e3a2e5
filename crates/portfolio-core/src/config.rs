//! 설정 관리.
//!
//! 이 모듈은 엔진 설정을 정의하고 관리합니다. 설정은 선택적 TOML 파일과
//! `PORTFOLIO__` 접두사의 환경 변수에서 로드되며, 누락된 값은 기본값을 사용합니다.
//!
//! 롤링 윈도우 크기(20/60일), 무위험 수익률(0), 연율화 계수(252)는
//! 설정 대상이 아닌 고정 상수입니다 ([`crate::types`] 참조).

use std::path::Path;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{PortfolioError, PortfolioResult};

/// 엔진 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 분석 설정
    pub analytics: AnalyticsConfig,
    /// 벤치마크 데이터 설정
    pub benchmarks: BenchmarkConfig,
    /// 일일 스케줄 설정
    pub schedule: ScheduleConfig,
    /// 재시도 설정
    pub retry: RetryConfig,
    /// 워커 설정
    pub worker: WorkerConfig,
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL (`DATABASE_URL` 환경 변수가 우선)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// 분석 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// 베타/알파 계산에 사용할 기본 벤치마크 심볼
    pub default_benchmark: String,
    /// 일별 집계 기준 시간대 (IANA 이름)
    pub timezone: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_benchmark: "SPY".to_string(),
            timezone: "America/New_York".to_string(),
        }
    }
}

/// 벤치마크 데이터 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// 매일 갱신할 심볼 목록 (쉼표로 구분)
    pub symbols: String,
    /// 심볼 간 요청 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 백필 기본 일수
    pub backfill_days: i64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            symbols: "SPY,QQQ,DIA,TLT".to_string(),
            request_delay_ms: 500,
            backfill_days: 365,
        }
    }
}

/// 일일 스케줄 설정 (`HH:MM`, 분석 시간대 기준).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 장 마감 후 벤치마크 갱신 시각
    pub benchmark_update: String,
    /// 전체 재계산 시각
    pub full_recompute: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            benchmark_update: "18:00".to_string(),
            full_recompute: "18:30".to_string(),
        }
    }
}

/// 재시도 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간 (밀리초), 시도마다 두 배
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

/// 워커 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 작업 1회 실행의 최대 시간 (초)
    pub job_timeout_secs: u64,
    /// 이벤트 작업 큐 용량
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: 300,
            queue_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> PortfolioResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("PORTFOLIO")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> PortfolioResult<Self> {
        Self::load("config/portfolio.toml")
    }

    /// 값 범위와 형식을 검증합니다.
    pub fn validate(&self) -> PortfolioResult<()> {
        if self.analytics.default_benchmark.trim().is_empty() {
            return Err(PortfolioError::Config(
                "analytics.default_benchmark가 비어 있습니다".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(PortfolioError::Config(
                "retry.max_attempts는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.worker.queue_capacity == 0 {
            return Err(PortfolioError::Config(
                "worker.queue_capacity는 1 이상이어야 합니다".to_string(),
            ));
        }
        self.analytics.tz()?;
        self.schedule.benchmark_update_time()?;
        self.schedule.full_recompute_time()?;
        Ok(())
    }

    /// 데이터베이스 URL. `DATABASE_URL` 환경 변수가 설정 파일보다 우선합니다.
    pub fn database_url(&self) -> PortfolioResult<String> {
        std::env::var("DATABASE_URL")
            .ok()
            .or_else(|| self.database.url.clone())
            .ok_or_else(|| {
                PortfolioError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
            })
    }
}

impl AnalyticsConfig {
    /// 집계 시간대를 파싱합니다.
    pub fn tz(&self) -> PortfolioResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| PortfolioError::Config(format!("잘못된 시간대 {}: {}", self.timezone, e)))
    }
}

impl BenchmarkConfig {
    /// 공백을 제거하고 대문자로 정규화한 심볼 목록.
    pub fn symbol_list(&self) -> Vec<String> {
        self.symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// 요청 간 딜레이를 Duration으로 반환
    pub fn request_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_delay_ms)
    }
}

impl ScheduleConfig {
    /// 벤치마크 갱신 시각
    pub fn benchmark_update_time(&self) -> PortfolioResult<NaiveTime> {
        parse_time_of_day(&self.benchmark_update)
    }

    /// 전체 재계산 시각
    pub fn full_recompute_time(&self) -> PortfolioResult<NaiveTime> {
        parse_time_of_day(&self.full_recompute)
    }
}

impl WorkerConfig {
    /// 작업 타임아웃을 Duration으로 반환
    pub fn job_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.job_timeout_secs)
    }
}

fn parse_time_of_day(value: &str) -> PortfolioResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| PortfolioError::Config(format!("잘못된 시각 형식 {}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.analytics.default_benchmark, "SPY");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.worker.job_timeout_secs, 300);
        assert_eq!(
            config.benchmarks.symbol_list(),
            vec!["SPY", "QQQ", "DIA", "TLT"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_schedule_times() {
        let schedule = ScheduleConfig::default();
        assert_eq!(
            schedule.benchmark_update_time().unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap()
        );
        assert_eq!(
            schedule.full_recompute_time().unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );

        let bad = ScheduleConfig {
            benchmark_update: "6pm".to_string(),
            ..Default::default()
        };
        assert!(bad.benchmark_update_time().is_err());
    }

    #[test]
    fn test_symbol_list_normalization() {
        let config = BenchmarkConfig {
            symbols: " spy, qqq ,,dia".to_string(),
            ..Default::default()
        };
        assert_eq!(config.symbol_list(), vec!["SPY", "QQQ", "DIA"]);
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let mut config = EngineConfig::default();
        config.analytics.timezone = "Mars/Olympus".to_string();
        assert!(matches!(config.validate(), Err(PortfolioError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = EngineConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.schedule.full_recompute, "18:30");
    }
}
