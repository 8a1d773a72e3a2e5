//! 자산 곡선 Repository.

use chrono::{DateTime, Utc};
use portfolio_core::{EquityData, EquitySnapshot};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{opt_decimal, to_decimal, to_f64};
use crate::error::{DataError, Result};

/// `equity_curve` 테이블 Repository.
///
/// 스냅샷은 추가만 하며 하루에 여러 개가 있을 수 있습니다.
pub struct EquityRepository;

impl EquityRepository {
    /// 자산 스냅샷 추가.
    pub async fn insert(pool: &PgPool, data: &EquityData) -> Result<()> {
        let equity = to_decimal(data.equity, 4)
            .ok_or_else(|| DataError::InvalidData("equity가 유한하지 않음".to_string()))?;
        let cash = to_decimal(data.cash, 4)
            .ok_or_else(|| DataError::InvalidData("cash가 유한하지 않음".to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO equity_curve (time, equity, cash, margin_used)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(data.time)
        .bind(equity)
        .bind(cash)
        .bind(opt_decimal(data.margin_used, 4))
        .execute(pool)
        .await?;

        Ok(())
    }

    /// 가장 오래된 스냅샷 시각.
    pub async fn earliest_time(pool: &PgPool) -> Result<Option<DateTime<Utc>>> {
        let earliest: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MIN(time) FROM equity_curve")
                .fetch_one(pool)
                .await?;
        Ok(earliest)
    }

    /// 스냅샷 이력 (시간순). `from`이 없으면 전체.
    pub async fn load_history(
        pool: &PgPool,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<EquitySnapshot>> {
        let rows: Vec<(DateTime<Utc>, Decimal, Decimal, Option<Decimal>)> = sqlx::query_as(
            r#"
            SELECT time, equity, cash, margin_used
            FROM equity_curve
            WHERE ($1::timestamptz IS NULL OR time >= $1)
            ORDER BY time ASC, id ASC
            "#,
        )
        .bind(from)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(time, equity, cash, margin_used)| EquitySnapshot {
                time,
                equity: to_f64(equity),
                cash: to_f64(cash),
                margin_used: margin_used.map(to_f64),
            })
            .collect())
    }
}
