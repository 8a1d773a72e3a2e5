//! 종목 및 일봉 Repository.

use chrono::NaiveDate;
use portfolio_core::{BenchmarkBar, OhlcBar};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{to_decimal, to_f64};
use crate::error::{DataError, Result};

/// `instruments` / `ohlc_daily` 테이블 Repository.
pub struct OhlcRepository;

impl OhlcRepository {
    /// 심볼의 종목 ID 조회. 없으면 생성합니다.
    pub async fn get_or_create_instrument(conn: &mut PgConnection, symbol: &str) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO instruments (symbol)
            VALUES ($1)
            ON CONFLICT (symbol) DO UPDATE SET symbol = EXCLUDED.symbol
            RETURNING id
            "#,
        )
        .bind(symbol)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// 일봉 배치 upsert (종목+날짜 기준).
    ///
    /// 종목이 없으면 함께 생성합니다. 하나의 트랜잭션으로 실행됩니다.
    pub async fn upsert_daily_bars(pool: &PgPool, symbol: &str, bars: &[OhlcBar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        let instrument_id = Self::get_or_create_instrument(&mut *tx, symbol).await?;

        for bar in bars {
            let price = |value: f64, field: &str| {
                to_decimal(value, 6).ok_or_else(|| {
                    DataError::InvalidData(format!("{} {} {}가 유한하지 않음", symbol, bar.date, field))
                })
            };

            sqlx::query(
                r#"
                INSERT INTO ohlc_daily (instrument_id, date, open, high, low, close, volume)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (instrument_id, date)
                DO UPDATE SET
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume
                "#,
            )
            .bind(instrument_id)
            .bind(bar.date)
            .bind(price(bar.open, "open")?)
            .bind(price(bar.high, "high")?)
            .bind(price(bar.low, "low")?)
            .bind(price(bar.close, "close")?)
            .bind(i64::try_from(bar.volume).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(symbol, count = bars.len(), "일봉 upsert 완료");
        Ok(bars.len())
    }

    /// 심볼의 종가 조회 (`from` 이후, 날짜순). 알 수 없는 심볼이면 빈 목록.
    pub async fn load_closes(
        pool: &PgPool,
        symbol: &str,
        from: NaiveDate,
    ) -> Result<Vec<BenchmarkBar>> {
        let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
            r#"
            SELECT o.date, o.close
            FROM ohlc_daily o
            JOIN instruments i ON i.id = o.instrument_id
            WHERE i.symbol = $1 AND o.date >= $2
            ORDER BY o.date ASC
            "#,
        )
        .bind(symbol)
        .bind(from)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, close)| BenchmarkBar {
                symbol: symbol.to_string(),
                date,
                close: to_f64(close),
            })
            .collect())
    }

    /// 심볼의 마지막 저장 일자.
    pub async fn latest_date(pool: &PgPool, symbol: &str) -> Result<Option<NaiveDate>> {
        let latest: Option<NaiveDate> = sqlx::query_scalar(
            r#"
            SELECT MAX(o.date)
            FROM ohlc_daily o
            JOIN instruments i ON i.id = o.instrument_id
            WHERE i.symbol = $1
            "#,
        )
        .bind(symbol)
        .fetch_one(pool)
        .await?;
        Ok(latest)
    }
}
