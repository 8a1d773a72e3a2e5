//! 거래 통계.
//!
//! 청산된 거래의 실현 손익 목록으로 승률, Profit Factor, 평균 손익, 기대값을 계산합니다.
//! 손익이 정확히 0인 거래는 승리도 패배도 아니지만 전체 거래 수에는 포함됩니다.

use serde::{Deserialize, Serialize};

/// 평균 손익 요약.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AverageTrade {
    /// 수익 거래 평균 (양수)
    pub avg_win: f64,
    /// 손실 거래 평균 (음수)
    pub avg_loss: f64,
    /// 전체 거래 평균
    pub avg_trade: f64,
}

/// 승률 (백분율, 예: 57.14 = 57.14%). 거래가 없으면 0.
pub fn win_rate(pnls: &[f64]) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }
    let wins = pnls.iter().filter(|&&p| p > 0.0).count();
    wins as f64 / pnls.len() as f64 * 100.0
}

/// Profit Factor (총수익 / 총손실).
///
/// 손실 없이 수익만 있으면 `f64::INFINITY`, 수익이 없으면 0입니다.
pub fn profit_factor(pnls: &[f64]) -> f64 {
    let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();

    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// 평균 수익, 평균 손실, 전체 평균.
pub fn average_trade(pnls: &[f64]) -> AverageTrade {
    let wins: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = pnls.iter().copied().filter(|&p| p < 0.0).collect();

    AverageTrade {
        avg_win: average(&wins),
        avg_loss: average(&losses),
        avg_trade: average(pnls),
    }
}

/// 기대값: 승리확률 × 평균수익 + 패배확률 × 평균손실(음수).
pub fn expectancy(pnls: &[f64]) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }

    let n = pnls.len() as f64;
    let win_prob = pnls.iter().filter(|&&p| p > 0.0).count() as f64 / n;
    let loss_prob = pnls.iter().filter(|&&p| p < 0.0).count() as f64 / n;
    let avg = average_trade(pnls);

    win_prob * avg.avg_win + loss_prob * avg.avg_loss
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
