//! 거래/포지션 Repository.

use portfolio_core::{PositionEvent, TradeEvent};
use sqlx::PgPool;
use uuid::Uuid;

use super::to_decimal;
use super::OhlcRepository;
use crate::error::{DataError, Result};

/// `trades` / `positions` 테이블 Repository.
pub struct TradeRepository;

impl TradeRepository {
    /// 거래 저장.
    ///
    /// `external_id`가 이미 있으면 아무것도 쓰지 않고 `false`를 반환합니다.
    pub async fn insert_trade(pool: &PgPool, event: &TradeEvent) -> Result<bool> {
        let trade = &event.data;
        let qty = to_decimal(trade.qty, 8)
            .ok_or_else(|| DataError::InvalidData("qty가 유한하지 않음".to_string()))?;
        let price = to_decimal(trade.price, 8)
            .ok_or_else(|| DataError::InvalidData("price가 유한하지 않음".to_string()))?;
        let fees = to_decimal(trade.fees, 8).unwrap_or_default();

        let mut tx = pool.begin().await?;
        let instrument_id = OhlcRepository::get_or_create_instrument(&mut *tx, &trade.symbol).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO trades (id, external_id, instrument_id, time, side, qty, price, fees, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (external_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&trade.external_id)
        .bind(instrument_id)
        .bind(trade.time)
        .bind(trade.side.as_str())
        .bind(qty)
        .bind(price)
        .bind(fees)
        .bind(&event.source)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// 종목별 현재 포지션 upsert.
    pub async fn upsert_position(pool: &PgPool, event: &PositionEvent) -> Result<()> {
        let position = &event.data;
        let qty = to_decimal(position.qty, 8)
            .ok_or_else(|| DataError::InvalidData("qty가 유한하지 않음".to_string()))?;
        let avg_price = to_decimal(position.avg_price, 8)
            .ok_or_else(|| DataError::InvalidData("avgPrice가 유한하지 않음".to_string()))?;
        let realized_pnl = to_decimal(position.realized_pnl, 4).unwrap_or_default();

        let mut tx = pool.begin().await?;
        let instrument_id =
            OhlcRepository::get_or_create_instrument(&mut *tx, &position.symbol).await?;

        sqlx::query(
            r#"
            INSERT INTO positions (instrument_id, qty, avg_price, realized_pnl, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (instrument_id)
            DO UPDATE SET
                qty = EXCLUDED.qty,
                avg_price = EXCLUDED.avg_price,
                realized_pnl = EXCLUDED.realized_pnl,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(instrument_id)
        .bind(qty)
        .bind(avg_price)
        .bind(realized_pnl)
        .bind(position.time)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
