//! 분석 결과 pub/sub 브로커.
//!
//! 프로세스가 생성해 `Arc`로 필요한 컴포넌트(수신 파이프라인, 재계산 엔진)에 넘깁니다.
//! 구독자 세션과 채널 구독을 관리하고 메시지를 브로드캐스트합니다.
//! 전송 계층(WebSocket 등)은 [`AnalyticsBroker::next_for`]로 세션별 메시지를 받습니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use portfolio_core::{AnalyticsRecord, EquityData, TradeData};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

/// 구독 채널.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// 자산 스냅샷 갱신
    Portfolio,
    /// 신규 거래
    Trades,
    /// 분석 결과 갱신
    Analytics,
    /// 모든 메시지
    All,
}

impl Channel {
    /// 문자열에서 채널 파싱.
    pub fn from_channel(channel: &str) -> Option<Self> {
        match channel.trim().to_lowercase().as_str() {
            "portfolio" => Some(Channel::Portfolio),
            "trades" => Some(Channel::Trades),
            "analytics" => Some(Channel::Analytics),
            "all" => Some(Channel::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Portfolio => "portfolio",
            Channel::Trades => "trades",
            Channel::Analytics => "analytics",
            Channel::All => "all",
        }
    }
}

/// 메시지 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    PortfolioUpdate,
    NewTrade,
    AnalyticsUpdate,
}

/// 브로드캐스트 메시지.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub channel: Channel,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl BroadcastMessage {
    /// 자산 스냅샷 메시지 (`portfolio` 채널).
    pub fn portfolio_update(equity: &EquityData) -> Self {
        Self {
            kind: MessageKind::PortfolioUpdate,
            channel: Channel::Portfolio,
            data: serde_json::json!({
                "equity": equity.equity,
                "cash": equity.cash,
                "timestamp": equity.time,
            }),
            timestamp: Utc::now(),
        }
    }

    /// 신규 거래 메시지 (`trades` 채널).
    pub fn new_trade(trade: &TradeData) -> Self {
        Self {
            kind: MessageKind::NewTrade,
            channel: Channel::Trades,
            data: serde_json::json!({
                "symbol": trade.symbol,
                "side": trade.side.as_str(),
                "qty": trade.qty,
                "price": trade.price,
                "time": trade.time,
            }),
            timestamp: Utc::now(),
        }
    }

    /// 분석 결과 메시지 (`analytics` 채널).
    pub fn analytics_update(record: &AnalyticsRecord) -> Self {
        Self {
            kind: MessageKind::AnalyticsUpdate,
            channel: Channel::Analytics,
            data: serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
            timestamp: Utc::now(),
        }
    }
}

/// 구독자 세션.
#[derive(Debug)]
pub struct SubscriberSession {
    pub id: String,
    pub channels: HashSet<Channel>,
}

impl SubscriberSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channels: HashSet::new(),
        }
    }

    /// 메시지를 수신해야 하는지 확인. `all` 구독자는 모든 메시지를 받습니다.
    pub fn should_receive(&self, message: &BroadcastMessage) -> bool {
        self.channels.contains(&Channel::All) || self.channels.contains(&message.channel)
    }
}

/// pub/sub 브로커.
pub struct AnalyticsBroker {
    /// 메시지 브로드캐스트 채널
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    /// 구독자 세션 목록
    sessions: RwLock<HashMap<String, SubscriberSession>>,
}

impl AnalyticsBroker {
    /// 새로운 브로커 생성.
    ///
    /// # Arguments
    ///
    /// * `capacity` - 브로드캐스트 채널 버퍼 크기
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            broadcast_tx: tx,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 구독자 등록.
    ///
    /// 알 수 없는 채널 이름은 무시하며, 유효한 채널이 하나도 없으면 `all`을 구독합니다.
    pub async fn register(
        &self,
        session_id: &str,
        channels: &[String],
    ) -> broadcast::Receiver<BroadcastMessage> {
        let mut session = SubscriberSession::new(session_id);
        session
            .channels
            .extend(channels.iter().filter_map(|c| Channel::from_channel(c)));
        if session.channels.is_empty() {
            session.channels.insert(Channel::All);
        }

        tracing::debug!(
            session_id,
            channels = ?session.channels,
            "구독자 등록"
        );

        let rx = self.broadcast_tx.subscribe();
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), session);
        rx
    }

    /// 구독자 제거.
    pub async fn unregister(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// 채널 구독 추가. 실제로 추가된 채널 이름을 반환합니다.
    pub async fn subscribe(&self, session_id: &str, channels: &[String]) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let mut subscribed = Vec::new();

        if let Some(session) = sessions.get_mut(session_id) {
            for channel in channels {
                if let Some(parsed) = Channel::from_channel(channel) {
                    session.channels.insert(parsed);
                    subscribed.push(parsed.as_str().to_string());
                }
            }
        }

        subscribed
    }

    /// 채널 구독 해제.
    pub async fn unsubscribe(&self, session_id: &str, channels: &[String]) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let mut removed = Vec::new();

        if let Some(session) = sessions.get_mut(session_id) {
            for channel in channels {
                if let Some(parsed) = Channel::from_channel(channel) {
                    if session.channels.remove(&parsed) {
                        removed.push(parsed.as_str().to_string());
                    }
                }
            }
        }

        removed
    }

    /// 메시지 발행.
    ///
    /// 수신자가 없으면 0을 반환합니다 (에러 아님).
    pub fn publish(&self, message: BroadcastMessage) -> usize {
        let kind = message.kind;
        match self.broadcast_tx.send(message) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!(kind = ?kind, "수신자 없음, 메시지 폐기");
                0
            }
        }
    }

    /// 세션이 메시지를 수신해야 하는지 확인.
    pub async fn should_session_receive(&self, session_id: &str, message: &BroadcastMessage) -> bool {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|s| s.should_receive(message))
            .unwrap_or(false)
    }

    /// 세션이 구독한 채널의 다음 메시지.
    ///
    /// 처리가 밀려 누락된 메시지는 건너뛰고, 브로커가 닫히면 `None`을 반환합니다.
    pub async fn next_for(
        &self,
        session_id: &str,
        rx: &mut broadcast::Receiver<BroadcastMessage>,
    ) -> Option<BroadcastMessage> {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if self.should_session_receive(session_id, &message).await {
                        return Some(message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(session_id, skipped, "구독자 처리 지연, 메시지 누락");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// 연결된 구독자 수.
    pub async fn client_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// 채널별 구독자 수.
    pub async fn subscriber_counts(&self) -> HashMap<Channel, usize> {
        let sessions = self.sessions.read().await;
        let mut counts = HashMap::new();
        for session in sessions.values() {
            for channel in &session.channels {
                *counts.entry(*channel).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl Default for AnalyticsBroker {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// 공유 가능한 브로커 타입.
pub type SharedBroker = Arc<AnalyticsBroker>;

/// 새로운 공유 브로커 생성.
pub fn create_broker(capacity: usize) -> SharedBroker {
    Arc::new(AnalyticsBroker::new(capacity))
}
