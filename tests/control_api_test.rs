// author: kodeholic

use portpicker::pick_unused_port;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use mini_conductor::core::{ConductorEvent, PeerId, SessionPhase, SessionSnapshot};
use mini_conductor::http::{control_router, HttpState};
use mini_conductor::trace::{TraceDir, TraceEvent, TraceHub};
use mini_conductor::ui::{ControlSurface, UiCommand, UiSurface, UiView};

// ----------------------------------------------------------------------------
// [테스트 헬퍼]
// ----------------------------------------------------------------------------

struct ControlApi {
    base:      String,
    rx:        mpsc::UnboundedReceiver<ConductorEvent>,
    status:    watch::Sender<SessionSnapshot>,
    ui:        Arc<ControlSurface>,
    trace_hub: Arc<TraceHub>,
    client:    reqwest::Client,
}

impl ControlApi {
    async fn post(&self, path: &str) -> (u16, Value) {
        let resp = self.client.post(format!("{}{}", self.base, path)).send().await.expect("요청 실패");
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or_default())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(format!("{}{}", self.base, path)).send().await.expect("요청 실패");
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or_default())
    }

    fn set_status(&self, snapshot: SessionSnapshot) {
        self.status.send_replace(snapshot);
    }

    fn next_command(&mut self) -> UiCommand {
        match self.rx.try_recv().expect("owner 루프로 전달된 명령이 없습니다.") {
            ConductorEvent::Ui(command) => command,
            other => panic!("UI 명령이 아닙니다: {:?}", other),
        }
    }
}

async fn spawn_control_api() -> ControlApi {
    let port = pick_unused_port().expect("사용 가능한 포트를 찾을 수 없습니다.");
    let addr = format!("127.0.0.1:{}", port);

    let trace_hub          = TraceHub::new();
    let ui                 = Arc::new(ControlSurface::new(Arc::clone(&trace_hub)));
    let (tx, rx)           = mpsc::unbounded_channel();
    let (status, status_rx) = watch::channel(SessionSnapshot::default());

    let app = control_router(HttpState::new(tx, status_rx, Arc::clone(&ui), Arc::clone(&trace_hub)));
    let listener = TcpListener::bind(&addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    ControlApi {
        base: format!("http://{}", addr),
        rx,
        status,
        ui,
        trace_hub,
        client: reqwest::Client::new(),
    }
}

fn negotiating_with(peer: i32) -> SessionSnapshot {
    SessionSnapshot {
        phase:     SessionPhase::Negotiating,
        peer:      Some(PeerId(peer)),
        signed_in: true,
        ..SessionSnapshot::default()
    }
}

// ----------------------------------------------------------------------------
// [조회]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_session_and_ui() {
    let api = spawn_control_api().await;
    api.ui.message_box("Error", "Failed to connect to ws://127.0.0.1:8188", true);
    api.set_status(negotiating_with(0));

    let (code, body) = api.get("/admin/status").await;
    assert_eq!(code, 200);
    assert_eq!(body["session"]["phase"], "negotiating");
    assert_eq!(body["session"]["peer"], 0);
    assert_eq!(body["session"]["signed_in"], true);
    assert_eq!(body["ui"]["view"], "connect");
    assert_eq!(body["ui"]["notices"][0]["fatal"], true);
    assert!(body["uptime_secs"].is_u64());
}

// ----------------------------------------------------------------------------
// [조작]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn login_and_logout_are_forwarded() {
    let mut api = spawn_control_api().await;

    let (code, body) = api.post("/admin/login").await;
    assert_eq!(code, 202);
    assert_eq!(body["command"], "login");
    assert_eq!(api.next_command(), UiCommand::StartLogin);

    let (code, _) = api.post("/admin/logout").await;
    assert_eq!(code, 202);
    assert_eq!(api.next_command(), UiCommand::Disconnect);
}

#[tokio::test]
async fn connect_requires_sign_in_and_idle() {
    let mut api = spawn_control_api().await;

    let (code, body) = api.post("/admin/connect/3").await;
    assert_eq!(code, 409);
    assert_eq!(body["error"], "Not signed in");
    assert!(api.rx.try_recv().is_err());

    api.set_status(SessionSnapshot { signed_in: true, ..SessionSnapshot::default() });
    let (code, _) = api.post("/admin/connect/3").await;
    assert_eq!(code, 202);
    assert_eq!(api.next_command(), UiCommand::ConnectToPeer(PeerId(3)));

    api.set_status(negotiating_with(3));
    let (code, body) = api.post("/admin/connect/4").await;
    assert_eq!(code, 409);
    assert_eq!(body["error"], "We only support connecting to one peer at a time");
    assert_eq!(body["phase"], "negotiating");
}

#[tokio::test]
async fn hangup_requires_session() {
    let mut api = spawn_control_api().await;

    let (code, _) = api.post("/admin/hangup").await;
    assert_eq!(code, 409);

    api.set_status(negotiating_with(0));
    let (code, _) = api.post("/admin/hangup").await;
    assert_eq!(code, 202);
    assert_eq!(api.next_command(), UiCommand::DisconnectFromCurrentPeer);
}

#[tokio::test]
async fn commands_fail_when_owner_loop_is_gone() {
    let api = spawn_control_api().await;
    let ControlApi { base, rx, client, .. } = api;
    drop(rx);

    let resp = client.post(format!("{}/admin/login", base)).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 503);
}

// ----------------------------------------------------------------------------
// [Trace SSE]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn trace_stream_filters_by_peer() {
    let api = spawn_control_api().await;

    let mut resp = api.client
        .get(format!("{}/trace/3", api.base))
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    api.trace_hub.publish(TraceEvent::new(TraceDir::In, Some(9), "OFFER", "other peer"));
    api.trace_hub.publish(TraceEvent::new(TraceDir::Out, Some(3), "ANSWER", "our peer"));

    let body = tokio::time::timeout(Duration::from_secs(2), async {
        let mut body = String::new();
        while !body.contains("\n\n") {
            let chunk = resp.chunk().await.unwrap().expect("스트림 종료");
            body.push_str(&String::from_utf8_lossy(&chunk));
        }
        body
    })
    .await
    .expect("SSE 이벤트 타임아웃");

    assert!(body.starts_with("data: "), "{}", body);
    assert!(body.contains("\"peer_id\":3"));
    assert!(body.contains("ANSWER"));
    assert!(!body.contains("other peer"));
}

#[tokio::test]
async fn ui_view_changes_reach_trace_stream() {
    let api = spawn_control_api().await;

    let mut resp = api.client.get(format!("{}/trace", api.base)).send().await.unwrap();
    api.ui.switch_to_peer_list(&[]);
    assert_eq!(api.ui.current_view(), UiView::PeerList);

    let body = tokio::time::timeout(Duration::from_secs(2), async {
        let mut body = String::new();
        while !body.contains("\n\n") {
            let chunk = resp.chunk().await.unwrap().expect("스트림 종료");
            body.push_str(&String::from_utf8_lossy(&chunk));
        }
        body
    })
    .await
    .expect("SSE 이벤트 타임아웃");

    assert!(body.contains("UI_VIEW"));
    assert!(body.contains("connect -> peer_list"));
}
