// author: kodeholic
//
// 컨트롤 HTTP API
//
// /admin/*  → 상태 조회 + UI 명령 접수 (admin.rs)
// /trace    → TraceHub SSE (trace.rs)

pub mod admin;
pub mod dto;
pub mod state;
pub mod trace;

use axum::{routing::{get, post}, Router};
use tower_http::cors::{Any, CorsLayer};

pub use admin::{admin_connect, admin_hangup, admin_login, admin_logout, admin_status};
pub use state::HttpState;
pub use trace::trace_stream;

pub fn control_router(state: HttpState) -> Router {
    // CORS: 로컬 대시보드 접속 허용
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/admin/status",            get(admin_status))
        .route("/admin/login",             post(admin_login))
        .route("/admin/logout",            post(admin_logout))
        .route("/admin/connect/{peer_id}", post(admin_connect))
        .route("/admin/hangup",            post(admin_hangup))
        .route("/trace",                   get(trace_stream))
        .route("/trace/{peer_id}",         get(trace_stream))
        .with_state(state)
        .layer(cors)
}
