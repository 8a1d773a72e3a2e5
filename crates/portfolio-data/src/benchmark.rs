//! 벤치마크 일봉 수집.
//!
//! 장 마감 후 설정된 벤치마크 심볼(SPY, QQQ, DIA, TLT 등)의 일봉을 받아
//! `ohlc_daily`에 upsert합니다. 한 심볼의 실패는 다른 심볼 수집을 중단시키지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use portfolio_core::{OhlcBar, PortfolioError, PortfolioResult};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::error::DataError;

/// 일봉 데이터 소스.
#[async_trait]
pub trait BenchmarkFetcher: Send + Sync {
    /// `start`부터 `end`까지(양 끝 포함)의 일봉 (날짜순).
    async fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortfolioResult<Vec<OhlcBar>>;
}

/// 일봉 저장소.
#[async_trait]
pub trait BenchmarkStore: Send + Sync {
    /// 일봉 upsert (심볼+날짜 기준). 종목이 없으면 생성합니다.
    async fn upsert_daily_bars(&self, symbol: &str, bars: &[OhlcBar]) -> PortfolioResult<usize>;
}

/// Yahoo Finance 일봉 소스.
pub struct YahooBenchmarkFetcher {
    connector: yahoo_finance_api::YahooConnector,
    /// 거래소 시간대 (타임스탬프 → 거래일 변환용)
    exchange_tz: Tz,
}

impl YahooBenchmarkFetcher {
    pub fn new(exchange_tz: Tz) -> PortfolioResult<Self> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| {
            DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e))
        })?;
        Ok(Self {
            connector,
            exchange_tz,
        })
    }
}

#[async_trait]
impl BenchmarkFetcher for YahooBenchmarkFetcher {
    async fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortfolioResult<Vec<OhlcBar>> {
        // 종료일은 배타적이므로 하루 뒤까지 요청
        let start_dt = naive_date_to_offset_datetime(start)?;
        let end_dt = naive_date_to_offset_datetime(end + chrono::Duration::days(1))?;

        debug!(symbol, start = %start, end = %end, "Yahoo Finance 일봉 요청");

        let response = self
            .connector
            .get_quote_history_interval(symbol, start_dt, end_dt, "1d")
            .await
            .map_err(|e| DataError::FetchError(format!("Yahoo Finance API 오류 ({}): {}", symbol, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::ParseError(format!("Quote 파싱 오류: {}", e)))?;

        let mut bars: Vec<OhlcBar> = quotes
            .iter()
            .filter_map(|q| {
                let date = Utc
                    .timestamp_opt(q.timestamp as i64, 0)
                    .single()?
                    .with_timezone(&self.exchange_tz)
                    .date_naive();
                Some(OhlcBar {
                    date,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .filter(|bar| bar.date >= start && bar.date <= end && bar.close.is_finite())
            .collect();

        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by_key(|bar| bar.date);
        Ok(bars)
    }
}

/// NaiveDate를 OffsetDateTime(UTC 자정)으로 변환.
fn naive_date_to_offset_datetime(date: NaiveDate) -> PortfolioResult<OffsetDateTime> {
    let month = time::Month::try_from(date.month() as u8)
        .map_err(|e| PortfolioError::InvalidInput(format!("잘못된 월: {}", e)))?;
    let date = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
        .map_err(|e| PortfolioError::InvalidInput(format!("잘못된 날짜: {}", e)))?;
    Ok(date.midnight().assume_utc())
}

/// 벤치마크 수집 결과.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkUpdateReport {
    /// 성공한 심볼 수
    pub succeeded: usize,
    /// 실패한 심볼
    pub failed: Vec<String>,
    /// 저장한 일봉 수
    pub bars_written: usize,
}

impl BenchmarkUpdateReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// 벤치마크 일봉 수집기.
pub struct BenchmarkUpdater {
    fetcher: Arc<dyn BenchmarkFetcher>,
    store: Arc<dyn BenchmarkStore>,
    /// 심볼 간 요청 간격 (Rate limit 방지)
    request_delay: Duration,
}

impl BenchmarkUpdater {
    pub fn new(
        fetcher: Arc<dyn BenchmarkFetcher>,
        store: Arc<dyn BenchmarkStore>,
        request_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            request_delay,
        }
    }

    /// 심볼별로 `day`의 일봉을 받아 저장합니다.
    ///
    /// 실패한 심볼은 로그로 남기고 다음 심볼로 넘어갑니다.
    pub async fn update_benchmarks(&self, symbols: &[String], day: NaiveDate) -> BenchmarkUpdateReport {
        let mut report = BenchmarkUpdateReport::default();

        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            match self.fetch_and_store(symbol, day, day).await {
                Ok(written) => {
                    if written == 0 {
                        // 휴장일이면 정상적으로 0건
                        debug!(symbol = %symbol, date = %day, "수집할 일봉 없음");
                    }
                    report.succeeded += 1;
                    report.bars_written += written;
                }
                Err(e) => {
                    error!(symbol = %symbol, date = %day, error = %e, "벤치마크 수집 실패");
                    report.failed.push(symbol.clone());
                }
            }
        }

        info!(
            date = %day,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            bars_written = report.bars_written,
            "벤치마크 수집 완료"
        );
        report
    }

    /// `today - days_back`부터 `today`까지(양 끝 포함) 일봉을 채웁니다.
    ///
    /// 장중에 실행하면 오늘 일봉은 미완성일 수 있으며, 다음 일일 수집이 같은 날짜를 덮어씁니다.
    pub async fn backfill_benchmark(
        &self,
        symbol: &str,
        days_back: i64,
        today: NaiveDate,
    ) -> PortfolioResult<usize> {
        if days_back <= 0 {
            return Err(PortfolioError::InvalidInput(format!(
                "days_back은 양수여야 합니다: {}",
                days_back
            )));
        }

        let start = today - chrono::Duration::days(days_back);
        let end = today;

        info!(symbol, start = %start, end = %end, "벤치마크 백필 시작");
        let written = self.fetch_and_store(symbol, start, end).await?;
        if written == 0 {
            warn!(symbol, "백필 구간에 일봉 없음");
        }
        info!(symbol, bars_written = written, "벤치마크 백필 완료");
        Ok(written)
    }

    async fn fetch_and_store(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortfolioResult<usize> {
        let bars = self.fetcher.fetch_daily(symbol, start, end).await?;
        if bars.is_empty() {
            return Ok(0);
        }
        self.store.upsert_daily_bars(symbol, &bars).await
    }
}
