//! 일별 분석 결과 Repository.

use chrono::NaiveDate;
use portfolio_core::AnalyticsRecord;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;

use super::{opt_decimal, to_decimal, to_f64};
use crate::error::{DataError, Result};

/// `analytics_daily` 테이블 Repository.
pub struct AnalyticsRepository;

type AnalyticsRow = (
    NaiveDate,
    Decimal,
    Option<Decimal>,
    Option<Decimal>,
    Option<Decimal>,
    Option<Decimal>,
    Option<Decimal>,
    Option<Decimal>,
    Option<Decimal>,
);

impl AnalyticsRepository {
    /// 분석 레코드 배치 upsert.
    ///
    /// 하나의 트랜잭션으로 실행되며 날짜가 이미 있으면 모든 지표 컬럼을 덮어씁니다.
    /// 중간에 실패하면 롤백되어 아무것도 기록되지 않습니다.
    pub async fn upsert_batch(pool: &PgPool, records: &[AnalyticsRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;

        for record in records {
            let total_equity = to_decimal(record.total_equity, 4).ok_or_else(|| {
                DataError::InvalidData(format!("{} total_equity가 유한하지 않음", record.date))
            })?;

            let [daily, cumulative, mdd, vol, sharpe, beta, alpha] = metric_columns(record);

            sqlx::query(
                r#"
                INSERT INTO analytics_daily (
                    date, total_equity, daily_return, cumulative_return, max_drawdown,
                    volatility_20d, sharpe_60d, beta_spy_60d, alpha_spy_60d, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
                ON CONFLICT (date)
                DO UPDATE SET
                    total_equity = EXCLUDED.total_equity,
                    daily_return = EXCLUDED.daily_return,
                    cumulative_return = EXCLUDED.cumulative_return,
                    max_drawdown = EXCLUDED.max_drawdown,
                    volatility_20d = EXCLUDED.volatility_20d,
                    sharpe_60d = EXCLUDED.sharpe_60d,
                    beta_spy_60d = EXCLUDED.beta_spy_60d,
                    alpha_spy_60d = EXCLUDED.alpha_spy_60d,
                    updated_at = NOW()
                "#,
            )
            .bind(record.date)
            .bind(total_equity)
            .bind(daily)
            .bind(cumulative)
            .bind(mdd)
            .bind(vol)
            .bind(sharpe)
            .bind(beta)
            .bind(alpha)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(count = records.len(), "분석 레코드 upsert 완료");
        Ok(records.len())
    }

    /// 기간 내 분석 레코드 조회 (양 끝 포함, 날짜 오름차순).
    pub async fn load_range(
        pool: &PgPool,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<AnalyticsRecord>> {
        let rows: Vec<AnalyticsRow> = sqlx::query_as(
            r#"
            SELECT date, total_equity, daily_return, cumulative_return, max_drawdown,
                   volatility_20d, sharpe_60d, beta_spy_60d, alpha_spy_60d
            FROM analytics_daily
            WHERE ($1::date IS NULL OR date >= $1)
              AND ($2::date IS NULL OR date <= $2)
            ORDER BY date ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }
}

/// 지표 컬럼 바인딩 값 (daily, cumulative, mdd, vol20, sharpe60, beta60, alpha60).
///
/// 컬럼은 자릿수 제한 없는 `NUMERIC`이므로 유한한 값은 크기와 관계없이 저장되고
/// NaN/무한대만 NULL이 됩니다.
fn metric_columns(record: &AnalyticsRecord) -> [Option<Decimal>; 7] {
    [
        opt_decimal(record.daily_return, 6),
        opt_decimal(record.cumulative_return, 6),
        opt_decimal(record.max_drawdown, 6),
        opt_decimal(record.volatility_20d, 6),
        opt_decimal(record.sharpe_60d, 4),
        opt_decimal(record.beta_60d, 4),
        opt_decimal(record.alpha_60d, 6),
    ]
}

fn row_to_record(row: AnalyticsRow) -> AnalyticsRecord {
    let (date, total_equity, daily, cumulative, mdd, vol, sharpe, beta, alpha) = row;
    AnalyticsRecord {
        date,
        total_equity: to_f64(total_equity),
        daily_return: daily.map(to_f64),
        cumulative_return: cumulative.map(to_f64),
        max_drawdown: mdd.map(to_f64),
        volatility_20d: vol.map(to_f64),
        sharpe_60d: sharpe.map(to_f64),
        beta_60d: beta.map(to_f64),
        alpha_60d: alpha.map(to_f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use portfolio_analytics::{compute_pass, DailyReturnSeries, DateSeries};
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal_macros::dec;

    const SCHEMA: &str = include_str!("../../../../migrations/0001_init.sql");

    #[test]
    fn test_metric_columns_have_no_precision_limit() {
        let table = SCHEMA
            .split("CREATE TABLE IF NOT EXISTS analytics_daily")
            .nth(1)
            .and_then(|rest| rest.split(");").next())
            .unwrap();

        for column in [
            "daily_return",
            "cumulative_return",
            "max_drawdown",
            "volatility_20d",
            "sharpe_60d",
            "beta_spy_60d",
            "alpha_spy_60d",
        ] {
            let line = table
                .lines()
                .find(|l| l.trim_start().starts_with(column))
                .unwrap();
            assert!(line.contains("NUMERIC"), "{}", line);
            assert!(!line.contains("NUMERIC("), "{}", line);
        }
    }

    #[test]
    fn test_low_variance_sharpe_is_stored_in_full() {
        // 매일 0.01%씩 늘어나는 이자 계좌 (소수 4자리 저장)
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let daily = DateSeries::from_pairs((0..70).map(|i| {
            let equity = (100_000.0 * 1.0001_f64.powi(i) * 10_000.0).round() / 10_000.0;
            (start + Duration::days(i as i64), equity)
        }));

        let pass = compute_pass(&daily, &DailyReturnSeries::default(), start);
        let last = pass.records.last().unwrap();
        let sharpe = last.sharpe_60d.unwrap();
        assert!(sharpe > 999_999.9999);

        let [.., stored_sharpe, _, _] = metric_columns(last);
        let stored = stored_sharpe.unwrap().to_f64().unwrap();
        assert!((stored - sharpe).abs() < 1e-4);

        // 모든 유한 지표는 NULL로 바뀌지 않음
        for record in &pass.records {
            let columns = metric_columns(record);
            let values = [
                record.daily_return,
                record.cumulative_return,
                record.max_drawdown,
                record.volatility_20d,
                record.sharpe_60d,
                record.beta_60d,
                record.alpha_60d,
            ];
            for (column, value) in columns.iter().zip(values) {
                assert_eq!(column.is_some(), value.is_some());
            }
        }
    }

    #[test]
    fn test_tiny_first_deposit_cumulative_return() {
        let record = AnalyticsRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            total_equity: 250_000.0,
            daily_return: Some(24_999.0),
            cumulative_return: Some(24_999.0),
            max_drawdown: Some(0.0),
            volatility_20d: None,
            sharpe_60d: None,
            beta_60d: None,
            alpha_60d: None,
        };

        let [daily, cumulative, ..] = metric_columns(&record);
        assert_eq!(daily, Some(dec!(24999)));
        assert_eq!(cumulative, Some(dec!(24999)));
    }

    #[test]
    fn test_row_to_record_keeps_nulls() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let record = row_to_record((
            date,
            dec!(101000.5),
            Some(dec!(0.01)),
            Some(dec!(0.01)),
            Some(dec!(0)),
            None,
            None,
            None,
            None,
        ));

        assert_eq!(record.date, date);
        assert_eq!(record.total_equity, 101000.5);
        assert_eq!(record.daily_return, Some(0.01));
        assert_eq!(record.volatility_20d, None);
        assert_eq!(record.beta_60d, None);
    }
}
