// author: kodeholic
// OutboundQueue: 송신 대기열 (FIFO, in-flight 1건)
//
// 규칙:
//   - enqueue 순서 그대로 transport 에 전달
//   - in-flight 가 있으면 drain_one 은 None: 다음 drain 은 complete() 이후
//   - 폴링 없음: transport 의 message_sent 알림이 complete() 를 부른다
//   - 송신 실패 시 재시도 없음 (호출 측이 teardown 후 clear)

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::core::state::PeerId;

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub peer:        PeerId,
    pub payload:     Bytes,
    /// 로그/트레이스용 ("OFFER", "CANDIDATE" 등)
    pub label:       String,
    pub transaction: Option<String>,
}

struct QueueInner {
    pending:   VecDeque<OutboundMessage>,
    in_flight: bool,
}

pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner { pending: VecDeque::new(), in_flight: false }),
        }
    }

    pub fn enqueue(&self, message: OutboundMessage) {
        self.inner.lock().pending.push_back(message);
    }

    /// 다음 메시지 꺼내기
    /// transport 가 준비되지 않았거나 in-flight 가 있으면 None
    pub fn drain_one(&self, transport_ready: bool) -> Option<OutboundMessage> {
        let mut inner = self.inner.lock();
        if !transport_ready || inner.in_flight {
            return None;
        }
        let next = inner.pending.pop_front()?;
        inner.in_flight = true;
        Some(next)
    }

    /// transport 송신 완료 알림 (성공/실패 무관)
    pub fn complete(&self) {
        self.inner.lock().in_flight = false;
    }

    /// teardown 시 대기열 폐기 + in-flight 해제
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.pending.len();
        inner.pending.clear();
        inner.in_flight = false;
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.lock().in_flight
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn msg(label: &str) -> OutboundMessage {
        OutboundMessage {
            peer:        PeerId(1),
            payload:     Bytes::from(label.to_string()),
            label:       label.to_string(),
            transaction: None,
        }
    }

    #[test]
    fn drains_in_enqueue_order_one_at_a_time() {
        let q = OutboundQueue::new();
        q.enqueue(msg("a"));
        q.enqueue(msg("b"));

        assert_eq!(q.drain_one(true).unwrap().label, "a");
        assert!(q.drain_one(true).is_none(), "in-flight 중에는 다음 메시지를 꺼내면 안 됩니다.");
        assert!(q.is_in_flight());

        q.complete();
        assert_eq!(q.drain_one(true).unwrap().label, "b");
        q.complete();
        assert!(q.drain_one(true).is_none());
    }

    #[test]
    fn not_ready_transport_holds_messages() {
        let q = OutboundQueue::new();
        q.enqueue(msg("a"));
        assert!(q.drain_one(false).is_none());
        assert!(!q.is_in_flight());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn clear_drops_pending_and_releases_in_flight() {
        let q = OutboundQueue::new();
        q.enqueue(msg("a"));
        q.enqueue(msg("b"));
        q.drain_one(true);

        assert_eq!(q.clear(), 1);
        assert!(q.is_empty());
        assert!(!q.is_in_flight());
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        let q = Arc::new(OutboundQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|p| {
                let q = Arc::clone(&q);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        q.enqueue(msg(&format!("{}-{}", p, i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut last = [-1i32; 4];
        let mut total = 0;
        while let Some(m) = q.drain_one(true) {
            let (p, i) = m.label.split_once('-').unwrap();
            let (p, i): (usize, i32) = (p.parse().unwrap(), i.parse().unwrap());
            assert!(i > last[p], "producer {} 순서 역전", p);
            last[p] = i;
            total += 1;
            q.complete();
        }
        assert_eq!(total, 200);
    }
}
