//! 일간/누적 수익률과 최대 낙폭.

/// 일간 수익률 계산.
///
/// 입력과 같은 길이를 반환합니다. 첫 값은 항상 `Some(0.0)`이고,
/// 이후 `(v[i] - v[i-1]) / v[i-1]`입니다. 직전 값이 0이면 해당 위치는 `None`입니다.
///
/// # 인자
///
/// * `values` - 자산 시계열 (시간순)
pub fn daily_returns(values: &[f64]) -> Vec<Option<f64>> {
    let mut returns = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        if i == 0 {
            returns.push(Some(0.0));
            continue;
        }

        let prev = values[i - 1];
        if prev == 0.0 {
            returns.push(None);
        } else {
            returns.push(Some((value - prev) / prev).filter(|r| r.is_finite()));
        }
    }

    returns
}

/// 기준값 대비 누적 수익률.
///
/// `baseline`은 호출자가 가진 전체 이력의 첫 값이어야 하며, 반환하는 구간의 첫 값이 아닙니다.
/// 기준값이 0이면 모든 위치가 `None`입니다.
pub fn cumulative_returns(values: &[f64], baseline: f64) -> Vec<Option<f64>> {
    if baseline == 0.0 {
        return vec![None; values.len()];
    }

    values
        .iter()
        .map(|&v| Some(v / baseline - 1.0).filter(|r| r.is_finite()))
        .collect()
}

/// 최대 낙폭 (MDD) 계산.
///
/// 누적 고점 대비 하락률 `(v - peak) / peak`의 최소값을 반환합니다.
/// 단조 비감소 시계열은 정확히 0입니다. 빈 시계열은 `None`입니다.
///
/// 윈도우와 무관한 전체 구간의 단일 값입니다.
pub fn max_drawdown(values: &[f64]) -> Option<f64> {
    let first = *values.first()?;

    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &value in values {
        if value > peak {
            peak = value;
        }

        // 고점이 0 이하면 하락률이 정의되지 않음
        if peak > 0.0 {
            let dd = (value - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    Some(max_dd)
}
