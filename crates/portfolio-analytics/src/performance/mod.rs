//! 수익률/리스크 계산 모듈
//!
//! 날짜 순으로 정렬된 수치 시계열에 대한 순수 함수를 제공합니다. I/O와 상태가 없으며,
//! 수치적으로 정의되지 않는 값(0으로 나누기, 분산 0, 윈도우 부족)은 `None`으로 반환합니다.
//!
//! # 모듈 구성
//!
//! - [`returns`]: 일간/누적 수익률, 최대 낙폭
//! - [`rolling`]: 롤링 변동성, 샤프 비율, 베타/알파
//! - [`trade_stats`]: 승률, Profit Factor, 기대값 등 거래 통계

pub mod returns;
pub mod rolling;
pub mod trade_stats;

pub use returns::*;
pub use rolling::*;
pub use trade_stats::*;
