//! 수신 이벤트 처리 파이프라인.
//!
//! 검증 → 저장 → 재계산 예약 → 브로커 발행 순으로 처리합니다.
//! 재계산 예약이 실패해도 이벤트 저장 자체는 성공으로 취급합니다.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use portfolio_analytics::{BroadcastMessage, EventSink, SharedBroker};
use portfolio_core::{IngestEvent, PortfolioResult};
use tracing::{debug, error, info};

use crate::queue::{JobQueue, RecomputeJob};

/// 이벤트 처리 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub event_type: &'static str,
    /// 새로 저장되었는지 (중복 거래면 `false`)
    pub stored: bool,
    /// 예약된 재계산 시작 날짜
    pub recompute_from: Option<NaiveDate>,
}

/// 수신 이벤트 처리기.
pub struct EventIngestor {
    sink: Arc<dyn EventSink>,
    queue: JobQueue,
    broker: Option<SharedBroker>,
    /// 재계산 시작 날짜를 정하는 집계 시간대
    timezone: Tz,
}

impl EventIngestor {
    pub fn new(sink: Arc<dyn EventSink>, queue: JobQueue, timezone: Tz) -> Self {
        Self {
            sink,
            queue,
            broker: None,
            timezone,
        }
    }

    pub fn with_broker(mut self, broker: SharedBroker) -> Self {
        self.broker = Some(broker);
        self
    }

    /// JSON 본문 처리.
    pub async fn ingest_json(&self, body: &str) -> PortfolioResult<IngestOutcome> {
        let event = IngestEvent::from_json(body)?;
        self.ingest(event).await
    }

    /// 검증된 이벤트 처리.
    pub async fn ingest(&self, event: IngestEvent) -> PortfolioResult<IngestOutcome> {
        let event = event.validate()?;
        let event_type = event.event_type();

        let stored = match &event {
            IngestEvent::Trade(trade) => self.sink.record_trade(trade).await?,
            IngestEvent::Position(position) => {
                self.sink.upsert_position(position).await?;
                true
            }
            IngestEvent::Equity(equity) => {
                self.sink.insert_equity(equity).await?;
                true
            }
        };

        if !stored {
            info!(
                event_type,
                source = event.source(),
                symbol = event.symbol().unwrap_or_default(),
                "중복 거래, 건너뜀"
            );
            return Ok(IngestOutcome {
                event_type,
                stored,
                recompute_from: None,
            });
        }

        let event_date = event.event_date(&self.timezone);
        let recompute_from = match self.queue.schedule(RecomputeJob::RecomputeFrom(event_date)) {
            Ok(()) => Some(event_date),
            Err(e) => {
                error!(event_type, date = %event_date, error = %e, "재계산 예약 실패");
                None
            }
        };

        self.publish(&event);

        debug!(
            event_type,
            source = event.source(),
            date = %event_date,
            "이벤트 처리 완료"
        );

        Ok(IngestOutcome {
            event_type,
            stored,
            recompute_from,
        })
    }

    fn publish(&self, event: &IngestEvent) {
        let Some(broker) = &self.broker else {
            return;
        };
        let message = match event {
            IngestEvent::Trade(trade) => BroadcastMessage::new_trade(&trade.data),
            IngestEvent::Equity(equity) => BroadcastMessage::portfolio_update(&equity.data),
            IngestEvent::Position(_) => return,
        };
        broker.publish(message);
    }
}
