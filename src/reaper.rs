// author: kodeholic
// 트랜잭션 만료 태스크
//
// 주기마다 owner 루프에 ExpireTransactions 를 보낸다.
// TransactionMap 은 owner 루프 소유: 이 태스크는 직접 만지지 않는다.
// owner 루프가 종료되면 (send 실패) 함께 종료.

use tokio::sync::mpsc;
use tracing::info;

use crate::config;
use crate::core::ConductorEvent;

pub async fn run_transaction_reaper(events: mpsc::UnboundedSender<ConductorEvent>) {
    run_transaction_reaper_every(events, config::TRANSACTION_REAPER_INTERVAL_MS).await;
}

pub async fn run_transaction_reaper_every(events: mpsc::UnboundedSender<ConductorEvent>, interval_ms: u64) {
    let interval  = tokio::time::Duration::from_millis(interval_ms);
    let mut timer = tokio::time::interval(interval);
    timer.tick().await; // 첫 틱 skip (startup 시 즉시 실행 방지)

    info!("[transaction-reaper] Started (interval={}ms, timeout={}ms)",
        interval_ms, config::TRANSACTION_TIMEOUT_MS);

    loop {
        timer.tick().await;
        if events.send(ConductorEvent::ExpireTransactions).is_err() {
            info!("[transaction-reaper] owner loop gone, stopping");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticks_post_expiry_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_transaction_reaper_every(tx, 10));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ConductorEvent::ExpireTransactions));

        drop(rx);
        // 수신 측이 사라지면 태스크 종료
        tokio::time::timeout(std::time::Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
