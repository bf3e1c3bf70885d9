// author: kodeholic
//
// TraceHub: 시그널링 이벤트 실시간 관찰 버스
//
// 구조:
//   Conductor (owner 루프) / ControlSurface
//       └── TraceHub::publish(event)
//               └── broadcast::Sender  (구독자 수에 무관하게 O(1) publish)
//                       ├── SSE subscriber (cdtrace 프로세스 1)
//                       └── SSE subscriber (cdtrace 프로세스 2)
//
// 구독자가 없을 때 publish는 그냥 drop (owner 루프 성능에 무영향)
// 구독자가 느리면 lagged 에러 반환: 구독자 쪽에서 처리

use std::sync::Arc;
use tokio::sync::broadcast;
use serde::Serialize;

use crate::config;
use crate::utils::current_timestamp;

// ----------------------------------------------------------------------------
// [TraceEvent]: 관찰 가능한 시그널링 이벤트
// ----------------------------------------------------------------------------

/// 이벤트 방향
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TraceDir {
    /// 피어 → 컨덕터
    In,
    /// 컨덕터 → 피어
    Out,
    /// 컨덕터 내부 (상태 전이, UI 알림)
    Sys,
}

/// 하나의 시그널링 이벤트
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// Unix millis
    pub ts:      u64,
    pub dir:     TraceDir,
    /// 관련 피어 (없으면 None: 로그인, UI 알림 등)
    pub peer_id: Option<i32>,
    /// 이벤트 종류 (예: "OFFER", "CANDIDATE", "TEARDOWN")
    pub kind:    String,
    /// 이벤트 요약 메시지
    pub summary: String,
}

impl TraceEvent {
    pub fn new(
        dir:     TraceDir,
        peer_id: Option<i32>,
        kind:    &str,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            ts:      current_timestamp(),
            dir,
            peer_id,
            kind:    kind.to_string(),
            summary: summary.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// [TraceHub]
// ----------------------------------------------------------------------------

pub struct TraceHub {
    tx: broadcast::Sender<TraceEvent>,
}

impl TraceHub {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(config::TRACE_BUF);
        Arc::new(Self { tx })
    }

    /// 이벤트 publish: 구독자가 없으면 조용히 무시
    pub fn publish(&self, event: TraceEvent) {
        let _ = self.tx.send(event);
    }

    /// SSE 구독자 생성: 각 HTTP 연결마다 호출
    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscriber_no_panic() {
        let hub = TraceHub::new();
        hub.publish(TraceEvent::new(TraceDir::Sys, None, "TEST", "no subscriber"));
    }

    #[tokio::test]
    async fn subscribe_receives_event() {
        let hub = TraceHub::new();
        let mut rx = hub.subscribe();

        hub.publish(TraceEvent::new(TraceDir::In, Some(7), "OFFER", "v=0"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.dir, TraceDir::In);
        assert_eq!(event.peer_id, Some(7));
        assert_eq!(event.kind, "OFFER");
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let hub = TraceHub::new();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        hub.publish(TraceEvent::new(TraceDir::Out, Some(0), "CANDIDATE", "test"));

        assert_eq!(rx1.recv().await.unwrap().kind, "CANDIDATE");
        assert_eq!(rx2.recv().await.unwrap().kind, "CANDIDATE");
    }

    #[test]
    fn trace_event_serializes_to_json() {
        let event = TraceEvent::new(TraceDir::Sys, None, "TEARDOWN", "msg");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"dir\":\"sys\""));
        assert!(json.contains("\"peer_id\":null"));
    }
}
