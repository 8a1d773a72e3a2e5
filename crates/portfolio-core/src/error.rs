//! 분석 엔진의 에러 타입.
//!
//! 이 모듈은 엔진 전반에서 사용되는 에러 타입을 정의합니다.
//! 데이터 부족이나 수치적 퇴화(분산 0 등)는 에러가 아니라 `None` 결과로 표현되며,
//! 여기의 에러는 저장소/외부 데이터 실패와 잘못된 입력만 다룹니다.

use thiserror::Error;

/// 핵심 엔진 에러.
#[derive(Debug, Error)]
pub enum PortfolioError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 외부 데이터 소스 에러 (Yahoo 등)
    #[error("데이터 소스 에러: {0}")]
    DataSource(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 계산에 필요한 데이터 부족
    #[error("데이터 부족: {0}")]
    InsufficientData(String),

    /// 작업 시간 초과
    #[error("시간 초과: {0}")]
    Timeout(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 엔진 작업을 위한 Result 타입.
pub type PortfolioResult<T> = Result<T, PortfolioError>;

impl PortfolioError {
    /// 재시도 가능한 에러인지 확인합니다.
    ///
    /// 일시적인 I/O 실패(저장소, 외부 데이터, 타임아웃)만 재시도 대상입니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PortfolioError::Database(_) | PortfolioError::DataSource(_) | PortfolioError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for PortfolioError {
    fn from(err: serde_json::Error) -> Self {
        PortfolioError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for PortfolioError {
    fn from(err: config::ConfigError) -> Self {
        PortfolioError::Config(err.to_string())
    }
}
