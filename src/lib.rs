// author: kodeholic

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod http;
pub mod protocol;
pub mod reaper;
pub mod signaling;
pub mod trace;
pub mod ui;
pub mod utils;

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::{Conductor, ConductorEvent};
use crate::engine::{MediaEngine, SyntheticEngine};
use crate::error::ConductorResult;
use crate::http::HttpState;
use crate::signaling::{Credentials, SignalingTransport, WsSignalingClient};
use crate::trace::TraceHub;
use crate::ui::{ControlSurface, UiCommand, UiSurface};

/// CLI에서 주입되는 런타임 설정
/// - 기본값은 config.rs 상수
/// - 비밀값(SECRET)은 환경변수로 별도 관리
pub struct ConductorArgs {
    pub signaling_url: String,
    pub user:          String,
    pub secret:        String,
    pub control_port:  u16,
    /// 시작 즉시 로그인 (false 면 POST /admin/login 대기)
    pub auto_login:    bool,
}

impl Default for ConductorArgs {
    fn default() -> Self {
        Self {
            signaling_url: config::DEFAULT_SIGNALING_URL.to_string(),
            user:          config::DEFAULT_LOGIN_USER.to_string(),
            secret:        config::DEFAULT_LOGIN_SECRET.to_string(),
            control_port:  config::CONTROL_PORT,
            auto_login:    true,
        }
    }
}

pub async fn run_conductor(args: ConductorArgs) -> ConductorResult<()> {
    let trace_hub = TraceHub::new();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<ConductorEvent>();

    let engine: Arc<dyn MediaEngine> = Arc::new(SyntheticEngine::detect());
    let transport: Arc<dyn SignalingTransport> =
        Arc::new(WsSignalingClient::new(args.signaling_url.clone(), events_tx.clone()));
    let control = Arc::new(ControlSurface::new(Arc::clone(&trace_hub)));
    let ui: Arc<dyn UiSurface> = control.clone();

    let conductor = Conductor::new(
        engine,
        transport,
        ui,
        Arc::clone(&trace_hub),
        Credentials::new(args.user.clone(), args.secret.clone()),
        events_tx.clone(),
    );
    let status = conductor.subscribe_status();

    // owner 루프: 모든 상태 전이는 이 태스크 안에서만
    let owner = tokio::spawn(conductor.run(events_rx));

    // 응답 없는 트랜잭션 정리 태스크
    tokio::spawn(reaper::run_transaction_reaper(events_tx.clone()));

    if args.auto_login {
        let _ = events_tx.send(ConductorEvent::Ui(UiCommand::StartLogin));
    }

    let http_state = HttpState::new(events_tx.clone(), status, control, Arc::clone(&trace_hub));
    let app = http::control_router(http_state);

    let addr     = format!("127.0.0.1:{}", args.control_port);
    let listener = TcpListener::bind(&addr).await?;

    info!("[mini-conductor] Signaling server {} (user={})", args.signaling_url, args.user);
    info!("[mini-conductor] Control API on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("[mini-conductor] shutting down");
    let _ = events_tx.send(ConductorEvent::Shutdown);
    if let Err(e) = owner.await {
        warn!("[mini-conductor] owner loop join failed: {}", e);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[mini-conductor] ctrl-c handler failed: {}", e);
    }
}
