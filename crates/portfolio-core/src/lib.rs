//! # Portfolio Core
//!
//! 포트폴리오 분석 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 엔진 전반에서 사용되는 기본 타입을 제공합니다:
//! - 자산 스냅샷, 벤치마크 일봉, 일별 분석 레코드
//! - 웹훅 수신 이벤트 (거래/포지션/자산) 및 검증
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use events::*;
pub use logging::*;
pub use types::*;
