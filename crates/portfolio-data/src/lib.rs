//! 포트폴리오 분석 엔진 데이터 계층.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - PostgreSQL 연결 풀과 스키마 마이그레이션
//! - 테이블별 Repository (자산 곡선, 일봉, 거래/포지션, 분석 결과)
//! - 분석 엔진/수신 파이프라인용 저장소 구현
//! - Yahoo Finance 벤치마크 일봉 수집

pub mod benchmark;
pub mod database;
pub mod error;
pub mod repository;
pub mod store;

pub use benchmark::{
    BenchmarkFetcher, BenchmarkStore, BenchmarkUpdateReport, BenchmarkUpdater,
    YahooBenchmarkFetcher,
};
pub use database::Database;
pub use error::{DataError, Result};
pub use store::PgAnalyticsStore;
