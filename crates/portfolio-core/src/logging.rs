//! tracing 기반 로깅 초기화.
//!
//! 워커 프로세스는 시작 시 한 번 [`init_logging`]을 호출합니다.
//! 형식은 `LOG_FORMAT`(pretty/json/compact)으로, span 진입/종료 이벤트는
//! `LOG_SPAN_EVENTS`로 켭니다. CLI 인자가 있으면 환경 변수보다 우선합니다.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 개발용
    #[default]
    Pretty,
    /// 로그 집계용
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 필터 지시문 (예: "info", "portfolio_worker=debug")
    pub level: String,
    pub format: LogFormat,
    /// 작업 span의 진입/종료를 이벤트로 출력 (재계산 소요 시간 확인용)
    pub with_span_events: bool,
    /// 파일명과 줄 번호 포함
    pub with_file: bool,
}

impl LogConfig {
    /// 환경 변수에서 설정을 읽습니다. `RUST_LOG`가 없으면 `default_level`을 씁니다.
    pub fn from_env(default_level: &str) -> Self {
        let var = |name: &str| std::env::var(name).ok();

        Self {
            level: var("RUST_LOG").unwrap_or_else(|| default_level.to_string()),
            format: var("LOG_FORMAT")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            with_span_events: var("LOG_SPAN_EVENTS").is_some_and(|v| parse_flag(&v)),
            with_file: var("LOG_FILE_LINE").is_some_and(|v| parse_flag(&v)),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// 로깅 시스템을 초기화합니다. 두 번째 호출은 에러를 반환합니다.
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_new(&config.level)?;

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_span_events(span_events);

    let fmt_layer = match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Json => base.json().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        format = ?config.format,
        level = %config.level,
        span_events = config.with_span_events,
        "Logging initialized"
    );

    Ok(())
}

/// 재계산 작업 컨텍스트 필드가 포함된 span을 생성하는 매크로.
#[macro_export]
macro_rules! job_span {
    ($name:expr) => {
        tracing::info_span!("job", job = $name)
    };
    ($name:expr, $start_date:expr) => {
        tracing::info_span!("job", job = $name, start_date = %$start_date)
    };
}
