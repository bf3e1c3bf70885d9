// author: kodeholic
// HttpState: 컨트롤 API 핸들러 공유 상태
//
// 핸들러는 컨덕터 상태를 직접 만지지 않는다:
//   조회 → watch 로 받은 SessionSnapshot
//   조작 → owner 루프 채널에 UiCommand 전달

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::core::{ConductorEvent, SessionSnapshot};
use crate::trace::TraceHub;
use crate::ui::ControlSurface;
use crate::utils::current_timestamp;

#[derive(Clone)]
pub struct HttpState {
    pub events:        mpsc::UnboundedSender<ConductorEvent>,
    pub status:        watch::Receiver<SessionSnapshot>,
    pub ui:            Arc<ControlSurface>,
    pub trace_hub:     Arc<TraceHub>,
    /// 프로세스 시작 시각 (Unix millis): uptime 계산용
    pub start_time_ms: u64,
}

impl HttpState {
    pub fn new(
        events:    mpsc::UnboundedSender<ConductorEvent>,
        status:    watch::Receiver<SessionSnapshot>,
        ui:        Arc<ControlSurface>,
        trace_hub: Arc<TraceHub>,
    ) -> Self {
        Self { events, status, ui, trace_hub, start_time_ms: current_timestamp() }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.status.borrow().clone()
    }
}
