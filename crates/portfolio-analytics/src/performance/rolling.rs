//! 롤링 윈도우 지표.
//!
//! 모든 롤링 함수의 윈도우는 "현재 위치를 포함한 최근 `window`개 관측값"이며,
//! 첫 유효 출력은 `window - 1` 위치입니다. 윈도우 안에 `None`이 하나라도 있으면
//! 해당 위치의 결과도 `None`입니다.

use portfolio_core::TRADING_DAYS_PER_YEAR;
use serde::{Deserialize, Serialize};

/// 이 값 이하의 분산은 부동소수점 오차로 보고 0으로 취급합니다.
const VARIANCE_EPSILON: f64 = 1e-20;

/// 특정 날짜의 롤링 베타/알파.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaAlpha {
    /// 공분산(포트폴리오, 벤치마크) / 분산(벤치마크)
    pub beta: f64,
    /// 연율화 알파
    pub alpha: f64,
}

/// 산술 평균.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// 표본 분산 (ddof=1).
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    sample_covariance(values, values)
}

/// 표본 공분산 (ddof=1). 길이가 다르거나 2개 미만이면 `None`.
pub fn sample_covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let mean_x = mean(x)?;
    let mean_y = mean(y)?;

    let sum: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum();

    Some(sum / (x.len() - 1) as f64)
}

/// 각 위치에서 끝나는 완전한 윈도우에 `f`를 적용합니다.
fn rolling_apply<F>(values: &[Option<f64>], window: usize, mut f: F) -> Vec<Option<f64>>
where
    F: FnMut(&[f64]) -> Option<f64>,
{
    let mut output = vec![None; values.len()];
    if window == 0 {
        return output;
    }

    let mut buffer = Vec::with_capacity(window);
    for end in (window - 1)..values.len() {
        buffer.clear();
        buffer.extend(values[end + 1 - window..=end].iter().flatten().copied());

        if buffer.len() == window {
            output[end] = f(&buffer).filter(|v| v.is_finite());
        }
    }

    output
}

/// 롤링 변동성.
///
/// 최근 `window`개 일간 수익률의 표본 표준편차입니다.
/// `annualize`가 참이면 `sqrt(252)`를 곱합니다.
pub fn rolling_volatility(
    returns: &[Option<f64>],
    window: usize,
    annualize: bool,
) -> Vec<Option<f64>> {
    let factor = if annualize {
        TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        1.0
    };

    rolling_apply(returns, window, |slice| {
        sample_variance(slice).map(|var| var.max(0.0).sqrt() * factor)
    })
}

/// 롤링 샤프 비율 (연율화).
///
/// 초과수익률 `r - risk_free_rate / 252`의 평균 / 표준편차 × `sqrt(252)`.
/// 표준편차가 0이면 `None`입니다.
///
/// # 인자
///
/// * `returns` - 일간 수익률
/// * `window` - 윈도우 크기 (거래일)
/// * `risk_free_rate` - 연 무위험 수익률
pub fn rolling_sharpe(
    returns: &[Option<f64>],
    window: usize,
    risk_free_rate: f64,
) -> Vec<Option<f64>> {
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;

    rolling_apply(returns, window, |slice| {
        let excess: Vec<f64> = slice.iter().map(|r| r - daily_rf).collect();
        let var = sample_variance(&excess)?;
        if var <= VARIANCE_EPSILON {
            return None;
        }
        Some(mean(&excess)? / var.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
    })
}

/// 롤링 베타/알파.
///
/// 두 시계열은 호출 전에 같은 날짜로 정렬되어 있어야 합니다
/// ([`crate::alignment::SeriesAligner::align`]). 길이가 다르면 모든 위치가 `None`입니다.
///
/// - `beta = cov(p, b) / var(b)`
/// - `alpha = (mean(p) - beta * mean(b)) * 252`
///
/// 벤치마크 분산이 0이면 해당 위치는 `None`입니다.
pub fn rolling_beta_alpha(
    portfolio: &[f64],
    benchmark: &[f64],
    window: usize,
) -> Vec<Option<BetaAlpha>> {
    let mut output = vec![None; portfolio.len()];
    if portfolio.len() != benchmark.len() || window < 2 {
        return output;
    }

    for end in (window - 1)..portfolio.len() {
        let p = &portfolio[end + 1 - window..=end];
        let b = &benchmark[end + 1 - window..=end];

        output[end] = beta_alpha(p, b);
    }

    output
}

fn beta_alpha(portfolio: &[f64], benchmark: &[f64]) -> Option<BetaAlpha> {
    let var_b = sample_variance(benchmark)?;
    if var_b <= VARIANCE_EPSILON {
        return None;
    }

    let beta = sample_covariance(portfolio, benchmark)? / var_b;
    let alpha = (mean(portfolio)? - beta * mean(benchmark)?) * TRADING_DAYS_PER_YEAR;

    if beta.is_finite() && alpha.is_finite() {
        Some(BetaAlpha { beta, alpha })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wrap(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    /// 결정적 의사난수 수익률 (선형 합동 생성기)
    fn pseudo_returns(n: usize, seed: u64, scale: f64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
                (unit - 0.5) * scale
            })
            .collect()
    }

    #[test]
    fn test_sample_statistics() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        // 표본 분산 = 32 / 7
        assert!((sample_variance(&values).unwrap() - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(sample_variance(&[1.0]), None);
        assert_eq!(sample_covariance(&[1.0, 2.0], &[1.0]), None);
    }

    #[test]
    fn test_rolling_volatility_window_boundary() {
        let returns = wrap(&pseudo_returns(30, 42, 0.04));
        let vol = rolling_volatility(&returns, 20, true);

        assert_eq!(vol.len(), 30);
        assert!(vol[..19].iter().all(Option::is_none));
        assert!(vol[19..].iter().all(|v| v.unwrap() > 0.0));
    }

    #[test]
    fn test_rolling_volatility_annualization() {
        let returns = wrap(&[0.01, -0.01, 0.02, -0.02]);
        let raw = rolling_volatility(&returns, 4, false)[3].unwrap();
        let annual = rolling_volatility(&returns, 4, true)[3].unwrap();

        assert!((annual / raw - 252f64.sqrt()).abs() < 1e-9);
        assert!((raw - sample_variance(&[0.01, -0.01, 0.02, -0.02]).unwrap().sqrt()).abs() < 1e-15);
    }

    #[test]
    fn test_rolling_volatility_gap_in_window() {
        let mut returns = wrap(&[0.01, 0.02, -0.01, 0.03, 0.0]);
        returns[2] = None;
        let vol = rolling_volatility(&returns, 3, false);

        // 인덱스 2~4의 윈도우는 모두 None을 포함
        assert_eq!(vol, vec![None; 5]);
    }

    #[test]
    fn test_rolling_sharpe_zero_std_is_none() {
        let returns = wrap(&[0.01; 10]);
        let sharpe = rolling_sharpe(&returns, 5, 0.0);
        assert!(sharpe.iter().all(Option::is_none));
    }

    #[test]
    fn test_rolling_sharpe_value() {
        let returns = wrap(&[0.01, 0.02, 0.03]);
        let sharpe = rolling_sharpe(&returns, 3, 0.0);

        assert_eq!(sharpe[0], None);
        assert_eq!(sharpe[1], None);
        // 평균 0.02, 표준편차 0.01
        assert!((sharpe[2].unwrap() - 2.0 * 252f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_sharpe_risk_free_shift() {
        let returns = wrap(&pseudo_returns(60, 7, 0.02));
        let base = rolling_sharpe(&returns, 60, 0.0)[59].unwrap();
        let with_rf = rolling_sharpe(&returns, 60, 0.02)[59].unwrap();
        assert!(with_rf < base);
    }

    #[test]
    fn test_rolling_beta_alpha_known_relationship() {
        let benchmark = pseudo_returns(100, 42, 0.02);
        let noise = pseudo_returns(100, 99, 0.002);
        let portfolio: Vec<f64> = benchmark
            .iter()
            .zip(&noise)
            .map(|(b, n)| b * 1.2 + n)
            .collect();

        let result = rolling_beta_alpha(&portfolio, &benchmark, 60);

        assert_eq!(result.len(), 100);
        assert!(result[..59].iter().all(Option::is_none));
        let last = result[99].unwrap();
        assert!(last.beta > 1.1 && last.beta < 1.3, "beta = {}", last.beta);
    }

    #[test]
    fn test_rolling_beta_alpha_exact_linear() {
        // p = 2b + 0.001 → beta 2, alpha 0.001 * 252
        let benchmark = [0.01, -0.02, 0.015, 0.0, 0.005];
        let portfolio: Vec<f64> = benchmark.iter().map(|b| 2.0 * b + 0.001).collect();

        let last = rolling_beta_alpha(&portfolio, &benchmark, 5)[4].unwrap();
        assert!((last.beta - 2.0).abs() < 1e-9);
        assert!((last.alpha - 0.252).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_beta_alpha_flat_benchmark() {
        let result = rolling_beta_alpha(&[0.01, 0.02, 0.03], &[0.0, 0.0, 0.0], 3);
        assert_eq!(result[2], None);
    }

    #[test]
    fn test_rolling_beta_alpha_length_mismatch() {
        let result = rolling_beta_alpha(&[0.01, 0.02, 0.03], &[0.01, 0.02], 2);
        assert!(result.iter().all(Option::is_none));
    }

    proptest! {
        #[test]
        fn prop_rolling_outputs_respect_window(
            values in prop::collection::vec(-0.1f64..0.1, 0..120),
            window in 2usize..30,
        ) {
            let returns = wrap(&values);
            let vol = rolling_volatility(&returns, window, true);
            let sharpe = rolling_sharpe(&returns, window, 0.0);

            prop_assert_eq!(vol.len(), values.len());
            prop_assert_eq!(sharpe.len(), values.len());
            for i in 0..values.len() {
                if i + 1 < window {
                    prop_assert!(vol[i].is_none());
                    prop_assert!(sharpe[i].is_none());
                } else {
                    prop_assert!(vol[i].map_or(false, |v| v >= 0.0));
                }
            }
        }
    }
}
