//! 데이터 모듈 오류 타입.

use portfolio_core::PortfolioError;
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 중복 레코드
    #[error("Duplicate record: {0}")]
    DuplicateError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 데이터 가져오기 오류 (외부 소스)
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                DataError::from_sqlstate(&code, db_err.message())
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl DataError {
    /// PostgreSQL SQLSTATE 코드별 분류.
    ///
    /// 22xxx(데이터 예외: 숫자 범위 초과, 잘못된 형식 등)는 같은 값으로 다시 시도해도
    /// 실패하므로 재시도하지 않는 `InvalidData`로 분류합니다.
    pub fn from_sqlstate(code: &str, message: &str) -> Self {
        if code == "23505" {
            // 고유 제약 조건 위반
            DataError::DuplicateError(message.to_string())
        } else if code.starts_with("22") {
            DataError::InvalidData(format!("{} (SQLSTATE {})", message, code))
        } else {
            DataError::QueryError(message.to_string())
        }
    }
}

impl From<DataError> for PortfolioError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => PortfolioError::NotFound(msg),
            DataError::InvalidData(msg) | DataError::ParseError(msg) => {
                PortfolioError::InvalidInput(msg)
            }
            DataError::FetchError(msg) => PortfolioError::DataSource(msg),
            DataError::MigrationError(msg) => PortfolioError::Internal(msg),
            other => PortfolioError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_retryability() {
        let err: PortfolioError = DataError::PoolExhausted.into();
        assert!(err.is_retryable());

        let err: PortfolioError = DataError::FetchError("timeout".into()).into();
        assert!(matches!(err, PortfolioError::DataSource(_)));
        assert!(err.is_retryable());

        let err: PortfolioError = DataError::ParseError("bad quote".into()).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_data_exception_is_not_retried() {
        // numeric field overflow
        let err = DataError::from_sqlstate("22003", "numeric field overflow");
        assert!(matches!(err, DataError::InvalidData(_)));
        let err: PortfolioError = err.into();
        assert!(matches!(err, PortfolioError::InvalidInput(_)));
        assert!(!err.is_retryable());

        let err = DataError::from_sqlstate("23505", "duplicate key");
        assert!(matches!(err, DataError::DuplicateError(_)));

        // 직렬화 실패 등은 기존처럼 재시도 대상
        let err: PortfolioError = DataError::from_sqlstate("40001", "could not serialize").into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DataError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DataError::NotFound(_)));
    }
}
