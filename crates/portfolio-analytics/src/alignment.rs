//! 일별 시계열 정렬 유틸리티.
//!
//! 불규칙한 자산 스냅샷을 달력 날짜당 하나의 값으로 만들고,
//! 포트폴리오와 벤치마크 시계열을 공통 날짜로 맞춥니다.
//!
//! # 핵심 규칙
//!
//! - 하루에 여러 스냅샷이 있으면 시간상 마지막 스냅샷의 자산만 사용합니다.
//! - 스냅샷이 없는 날은 결과에 없습니다 (forward-fill/보간 없음).
//! - 정렬은 inner join입니다. 양쪽 모두에 있는 날짜만 남습니다.
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use portfolio_analytics::alignment::SeriesAligner;
//!
//! let daily = SeriesAligner::to_daily_series(&snapshots, &chrono_tz::America::New_York);
//! let bench = SeriesAligner::benchmark_daily_returns(&bars);
//! let (portfolio, benchmark) = SeriesAligner::align(&portfolio_returns, &bench);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use portfolio_core::{BenchmarkBar, EquitySnapshot};

/// 날짜가 엄격히 증가하는 시계열.
#[derive(Debug, Clone, PartialEq)]
pub struct DateSeries<T> {
    dates: Vec<NaiveDate>,
    values: Vec<T>,
}

/// 날짜별 자산 시계열.
pub type DailyEquitySeries = DateSeries<f64>;

/// 날짜별 수익률 시계열. 계산할 수 없는 날은 `None`.
pub type DailyReturnSeries = DateSeries<Option<f64>>;

impl<T> Default for DateSeries<T> {
    fn default() -> Self {
        Self {
            dates: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T> DateSeries<T> {
    /// 날짜-값 쌍으로 시계열을 만듭니다.
    ///
    /// 날짜 순으로 정렬하며, 같은 날짜가 반복되면 나중 값이 남습니다.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (NaiveDate, T)>) -> Self {
        let map: BTreeMap<NaiveDate, T> = pairs.into_iter().collect();
        let (dates, values) = map.into_iter().unzip();
        Self { dates, values }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &T)> {
        self.dates.iter().copied().zip(self.values.iter())
    }

    /// 같은 날짜 인덱스에 새 값을 붙인 시계열.
    ///
    /// `values` 길이가 다르면 짧은 쪽에 맞춰 잘립니다.
    pub fn with_values<U>(&self, values: Vec<U>) -> DateSeries<U> {
        let n = self.dates.len().min(values.len());
        let mut values = values;
        values.truncate(n);
        DateSeries {
            dates: self.dates[..n].to_vec(),
            values,
        }
    }
}

/// 시계열 정렬 유틸리티.
pub struct SeriesAligner;

impl SeriesAligner {
    /// 스냅샷을 일별 자산 시계열로 변환.
    ///
    /// # 인자
    ///
    /// * `snapshots` - 자산 스냅샷 (정렬 여부 무관)
    /// * `tz` - 달력 날짜를 나누는 기준 시간대
    ///
    /// # 반환
    ///
    /// 날짜마다 그날 마지막 스냅샷의 자산. 유한하지 않은 자산 값은 무시합니다.
    pub fn to_daily_series(snapshots: &[EquitySnapshot], tz: &Tz) -> DailyEquitySeries {
        let mut last_by_date: BTreeMap<NaiveDate, (DateTime<Utc>, f64)> = BTreeMap::new();

        for snapshot in snapshots.iter().filter(|s| s.equity.is_finite()) {
            let date = snapshot.time.with_timezone(tz).date_naive();

            match last_by_date.get(&date) {
                // 같은 시각이면 입력 순서상 나중 값이 우선
                Some((time, _)) if *time > snapshot.time => {}
                _ => {
                    last_by_date.insert(date, (snapshot.time, snapshot.equity));
                }
            }
        }

        DateSeries::from_pairs(
            last_by_date
                .into_iter()
                .map(|(date, (_, equity))| (date, equity)),
        )
    }

    /// 두 시계열을 공통 날짜로 정렬 (inner join).
    ///
    /// # 반환
    ///
    /// 같은 날짜 인덱스를 공유하는 두 시계열
    pub fn align<A: Clone, B: Clone>(
        a: &DateSeries<A>,
        b: &DateSeries<B>,
    ) -> (DateSeries<A>, DateSeries<B>) {
        let mut dates = Vec::new();
        let mut left = Vec::new();
        let mut right = Vec::new();

        let (mut i, mut j) = (0, 0);
        while i < a.dates.len() && j < b.dates.len() {
            match a.dates[i].cmp(&b.dates[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    dates.push(a.dates[i]);
                    left.push(a.values[i].clone());
                    right.push(b.values[j].clone());
                    i += 1;
                    j += 1;
                }
            }
        }

        (
            DateSeries {
                dates: dates.clone(),
                values: left,
            },
            DateSeries {
                dates,
                values: right,
            },
        )
    }

    /// 벤치마크 종가 대비 일간 수익률.
    ///
    /// 첫 날짜는 0이며, 직전 종가가 0 이하이면 해당 날짜는 `None`입니다.
    pub fn benchmark_daily_returns(bars: &[BenchmarkBar]) -> DailyReturnSeries {
        let closes = DateSeries::from_pairs(bars.iter().map(|bar| (bar.date, bar.close)));

        let returns = closes
            .values
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                if i == 0 {
                    return Some(0.0);
                }
                let prev = closes.values[i - 1];
                if prev > 0.0 {
                    Some((close - prev) / prev).filter(|r| r.is_finite())
                } else {
                    None
                }
            })
            .collect();

        closes.with_values(returns)
    }
}
