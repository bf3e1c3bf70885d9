// author: kodeholic
// UI / 컨트롤 표면 경계
//
// UiSurface  : 컨덕터 → UI (화면 전환, 알림, 렌더러 제어)
// UiCommand  : UI → 컨덕터 (owner 루프 채널로 전달)
// ControlSurface : 창 없는 기본 구현: 현재 화면을 기록하고 알림을 TraceHub 로 흘린다

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config;
use crate::core::state::PeerId;
use crate::engine::MediaTrack;
use crate::signaling::PeerEntry;
use crate::trace::{TraceDir, TraceEvent, TraceHub};
use crate::utils::current_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiView {
    Connect,
    PeerList,
    Streaming,
}

impl fmt::Display for UiView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiView::Connect   => f.write_str("connect"),
            UiView::PeerList  => f.write_str("peer_list"),
            UiView::Streaming => f.write_str("streaming"),
        }
    }
}

/// 사용자 조작 → 컨덕터
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    StartLogin,
    Disconnect,
    ConnectToPeer(PeerId),
    DisconnectFromCurrentPeer,
    Close,
}

pub trait UiSurface: Send + Sync {
    fn current_view(&self) -> UiView;

    fn switch_to_connect(&self);

    fn switch_to_peer_list(&self, peers: &[PeerEntry]);

    fn switch_to_streaming(&self);

    fn message_box(&self, title: &str, text: &str, fatal: bool);

    fn start_local_renderer(&self, track: &MediaTrack);

    fn stop_local_renderer(&self);

    fn start_remote_renderer(&self, track: &MediaTrack);

    fn stop_remote_renderer(&self);
}

// ----------------------------------------------------------------------------
// [ControlSurface]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub ts:    u64,
    pub title: String,
    pub text:  String,
    pub fatal: bool,
}

/// GET /admin/status 에 포함되는 UI 상태
#[derive(Debug, Clone, Serialize)]
pub struct UiSnapshot {
    pub view:            UiView,
    pub peers:           Vec<PeerEntry>,
    pub local_renderer:  Option<String>,
    pub remote_renderer: Option<String>,
    pub notices:         Vec<Notice>,
}

struct ViewState {
    view:            UiView,
    peers:           Vec<PeerEntry>,
    local_renderer:  Option<String>,
    remote_renderer: Option<String>,
    notices:         VecDeque<Notice>,
}

pub struct ControlSurface {
    state:     Mutex<ViewState>,
    trace_hub: Arc<TraceHub>,
}

impl ControlSurface {
    pub fn new(trace_hub: Arc<TraceHub>) -> Self {
        Self {
            state: Mutex::new(ViewState {
                view:            UiView::Connect,
                peers:           Vec::new(),
                local_renderer:  None,
                remote_renderer: None,
                notices:         VecDeque::new(),
            }),
            trace_hub,
        }
    }

    pub fn snapshot(&self) -> UiSnapshot {
        let state = self.state.lock();
        UiSnapshot {
            view:            state.view,
            peers:           state.peers.clone(),
            local_renderer:  state.local_renderer.clone(),
            remote_renderer: state.remote_renderer.clone(),
            notices:         state.notices.iter().cloned().collect(),
        }
    }

    fn switch(&self, view: UiView) {
        let prev = std::mem::replace(&mut self.state.lock().view, view);
        if prev != view {
            self.trace_hub.publish(TraceEvent::new(TraceDir::Sys, None, "UI_VIEW", format!("{} -> {}", prev, view)));
        }
    }
}

impl UiSurface for ControlSurface {
    fn current_view(&self) -> UiView {
        self.state.lock().view
    }

    fn switch_to_connect(&self) {
        self.state.lock().peers.clear();
        self.switch(UiView::Connect);
    }

    fn switch_to_peer_list(&self, peers: &[PeerEntry]) {
        self.state.lock().peers = peers.to_vec();
        self.switch(UiView::PeerList);
    }

    fn switch_to_streaming(&self) {
        self.switch(UiView::Streaming);
    }

    fn message_box(&self, title: &str, text: &str, fatal: bool) {
        if fatal {
            warn!("[ui] {}: {}", title, text);
        } else {
            info!("[ui] {}: {}", title, text);
        }
        {
            let mut state = self.state.lock();
            if state.notices.len() >= config::UI_NOTICE_HISTORY {
                state.notices.pop_front();
            }
            state.notices.push_back(Notice {
                ts:    current_timestamp(),
                title: title.to_string(),
                text:  text.to_string(),
                fatal,
            });
        }
        let kind = if fatal { "UI_ERROR" } else { "UI_NOTICE" };
        self.trace_hub.publish(TraceEvent::new(TraceDir::Sys, None, kind, format!("{}: {}", title, text)));
    }

    fn start_local_renderer(&self, track: &MediaTrack) {
        self.state.lock().local_renderer = Some(track.id.clone());
    }

    fn stop_local_renderer(&self) {
        self.state.lock().local_renderer = None;
    }

    fn start_remote_renderer(&self, track: &MediaTrack) {
        self.state.lock().remote_renderer = Some(track.id.clone());
    }

    fn stop_remote_renderer(&self) {
        self.state.lock().remote_renderer = None;
    }
}
