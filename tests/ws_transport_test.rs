// author: kodeholic

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use bytes::Bytes;
use parking_lot::Mutex;
use portpicker::pick_unused_port;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use mini_conductor::core::{ConductorEvent, PeerId};
use mini_conductor::signaling::{Credentials, PeerEntry, SignalingTransport, TransportEvent, WsSignalingClient};

// ----------------------------------------------------------------------------
// [가짜 Janus 서버]
// ----------------------------------------------------------------------------

#[derive(Clone)]
struct FakeJanus {
    /// 수신한 프레임 (JSON)
    frames:       Arc<Mutex<Vec<Value>>>,
    reject_login: bool,
}

async fn janus_handler(ws: WebSocketUpgrade, State(server): State<FakeJanus>) -> Response {
    ws.protocols(["janus-protocol"])
        .on_upgrade(move |socket| serve_janus(socket, server))
}

async fn serve_janus(mut socket: WebSocket, server: FakeJanus) {
    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        let frame: Value = match serde_json::from_str(text.as_str()) {
            Ok(v)  => v,
            Err(_) => continue,
        };
        server.frames.lock().push(frame.clone());

        let tx = frame["transaction"].clone();
        let reply = match frame["janus"].as_str() {
            Some("create") if server.reject_login => json!({
                "janus": "error", "transaction": tx,
                "error": { "code": 403, "reason": "Unauthorized request" },
            }),
            Some("create") => json!({ "janus": "success", "transaction": tx, "data": { "id": 4242 } }),
            Some(_) => continue,
            // offer / candidate → ack
            None => json!({ "janus": "ack", "transaction": tx }),
        };
        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
            break;
        }
    }
}

async fn spawn_fake_janus(reject_login: bool) -> (String, FakeJanus) {
    let port = pick_unused_port().expect("사용 가능한 포트를 찾을 수 없습니다.");
    let addr = format!("127.0.0.1:{}", port);

    let server = FakeJanus { frames: Arc::new(Mutex::new(Vec::new())), reject_login };
    let app = axum::Router::new()
        .route("/janus", axum::routing::get(janus_handler))
        .with_state(server.clone());

    let listener = TcpListener::bind(&addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (format!("ws://{}/janus", addr), server)
}

// ----------------------------------------------------------------------------
// [테스트 헬퍼]
// ----------------------------------------------------------------------------

async fn next_transport_event(rx: &mut mpsc::UnboundedReceiver<ConductorEvent>) -> TransportEvent {
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("transport 이벤트 타임아웃")
        .expect("채널 닫힘");
    match event {
        ConductorEvent::Transport(e) => e,
        other => panic!("transport 이벤트가 아닙니다: {:?}", other),
    }
}

async fn signed_in_client() -> (WsSignalingClient, mpsc::UnboundedReceiver<ConductorEvent>, FakeJanus) {
    let (url, server) = spawn_fake_janus(false).await;
    let (tx, mut rx)  = mpsc::unbounded_channel();
    let client = WsSignalingClient::new(url, tx);

    client.connect(&Credentials::new("1234", "1111"));
    assert_eq!(next_transport_event(&mut rx).await, TransportEvent::SignedIn);
    assert_eq!(
        next_transport_event(&mut rx).await,
        TransportEvent::PeerConnected { id: PeerId(0), name: "janus".into() }
    );
    (client, rx, server)
}

// ----------------------------------------------------------------------------
// [테스트]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn login_registers_server_as_peer() {
    let (client, _rx, server) = signed_in_client().await;

    assert!(client.is_connected());
    assert_eq!(client.peers(), vec![PeerEntry { id: PeerId(0), name: "janus".into() }]);

    let frames = server.frames.lock().clone();
    assert_eq!(frames[0]["janus"], "create");
    assert_eq!(frames[0]["credentials"]["user"], "1234");
    assert_eq!(frames[0]["credentials"]["secret"], "1111");
}

#[tokio::test]
async fn send_reports_completion_then_delivers_reply() {
    let (client, mut rx, server) = signed_in_client().await;

    let payload = json!({ "type": "offer", "sdp": "v=0\r\n", "transaction": "tx-offer-1" });
    assert!(client.send_to_peer(PeerId(0), Bytes::from(payload.to_string())));

    assert_eq!(next_transport_event(&mut rx).await, TransportEvent::MessageSent { ok: true });
    assert!(!client.is_sending());

    match next_transport_event(&mut rx).await {
        TransportEvent::MessageFromPeer { peer, payload } => {
            assert_eq!(peer, PeerId(0));
            let reply: Value = serde_json::from_slice(&payload).unwrap();
            assert_eq!(reply["janus"], "ack");
            assert_eq!(reply["transaction"], "tx-offer-1");
        }
        other => panic!("예상하지 못한 이벤트: {:?}", other),
    }

    let frames = server.frames.lock().clone();
    assert_eq!(frames[1]["type"], "offer");
}

#[tokio::test]
async fn send_to_unknown_peer_is_rejected() {
    let (client, _rx, _server) = signed_in_client().await;
    assert!(!client.send_to_peer(PeerId(5), Bytes::from_static(b"{}")));
    assert!(!client.is_sending());
}

#[tokio::test]
async fn rejected_login_reports_connection_failure() {
    let (url, _server) = spawn_fake_janus(true).await;
    let (tx, mut rx)   = mpsc::unbounded_channel();
    let client = WsSignalingClient::new(url, tx);

    client.connect(&Credentials::new("1234", "wrong"));
    assert_eq!(next_transport_event(&mut rx).await, TransportEvent::ServerConnectionFailure);
    assert_eq!(next_transport_event(&mut rx).await, TransportEvent::Disconnected);
    assert!(!client.is_connected());
    assert!(client.peers().is_empty());
}

#[tokio::test]
async fn sign_out_disconnects_server_peer() {
    let (client, mut rx, _server) = signed_in_client().await;

    client.sign_out();
    assert_eq!(next_transport_event(&mut rx).await, TransportEvent::PeerDisconnected(PeerId(0)));
    assert_eq!(next_transport_event(&mut rx).await, TransportEvent::Disconnected);
    assert!(!client.is_connected());

    // 재접속 가능
    client.connect(&Credentials::new("1234", "1111"));
    assert_eq!(next_transport_event(&mut rx).await, TransportEvent::SignedIn);
}

#[tokio::test]
async fn hang_up_frame_reaches_server() {
    let (client, _rx, server) = signed_in_client().await;
    assert!(client.send_hang_up(PeerId(0)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let frames = server.frames.lock().clone();
    assert!(frames.iter().any(|f| f["janus"] == "hangup"));
}
