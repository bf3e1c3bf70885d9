// author: kodeholic
// Admin REST API 핸들러
//
// 조회
//   GET  /admin/status              → 세션 상태 + UI 상태 요약
//
// 조작 (owner 루프에 UiCommand 접수 → 202)
//   POST /admin/login               → 시그널링 서버 로그인
//   POST /admin/logout              → 로그아웃
//   POST /admin/connect/{peer_id}   → 피어에 offer (Idle + 로그인 상태에서만)
//   POST /admin/hangup              → 현재 피어와 통화 종료

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::core::{ConductorEvent, PeerId, SessionPhase};
use crate::ui::UiCommand;
use crate::utils::current_timestamp;

use super::dto::*;
use super::state::HttpState;

// ----------------------------------------------------------------------------
// [유틸]
// ----------------------------------------------------------------------------

fn submit(state: &HttpState, command: UiCommand, name: &str) -> axum::response::Response {
    info!("[admin] {} requested", name);
    if state.events.send(ConductorEvent::Ui(command)).is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({
            "error": "conductor is not running"
        }))).into_response();
    }
    (StatusCode::ACCEPTED, Json(CommandAccepted::new(name))).into_response()
}

fn conflict(message: String, phase: SessionPhase) -> axum::response::Response {
    (StatusCode::CONFLICT, Json(serde_json::json!({
        "error": message,
        "phase": phase,
    }))).into_response()
}

// ----------------------------------------------------------------------------
// [핸들러]
// ----------------------------------------------------------------------------

/// GET /admin/status
pub async fn admin_status(State(state): State<HttpState>) -> impl IntoResponse {
    let uptime_secs = current_timestamp().saturating_sub(state.start_time_ms) / 1000;
    Json(StatusResponse {
        uptime_secs,
        session: state.snapshot(),
        ui:      state.ui.snapshot(),
    })
}

/// POST /admin/login
pub async fn admin_login(State(state): State<HttpState>) -> impl IntoResponse {
    submit(&state, UiCommand::StartLogin, "login")
}

/// POST /admin/logout
pub async fn admin_logout(State(state): State<HttpState>) -> impl IntoResponse {
    submit(&state, UiCommand::Disconnect, "logout")
}

/// POST /admin/connect/{peer_id}
pub async fn admin_connect(
    State(state): State<HttpState>,
    Path(peer_id): Path<i32>,
) -> impl IntoResponse {
    let snapshot = state.snapshot();
    if !snapshot.signed_in {
        return conflict("Not signed in".to_string(), snapshot.phase);
    }
    if snapshot.phase != SessionPhase::Idle {
        return conflict("We only support connecting to one peer at a time".to_string(), snapshot.phase);
    }
    submit(&state, UiCommand::ConnectToPeer(PeerId(peer_id)), "connect")
}

/// POST /admin/hangup
pub async fn admin_hangup(State(state): State<HttpState>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    if snapshot.phase == SessionPhase::Idle {
        return conflict("No active session".to_string(), snapshot.phase);
    }
    submit(&state, UiCommand::DisconnectFromCurrentPeer, "hangup")
}
