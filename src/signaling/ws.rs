// author: kodeholic
// WsSignalingClient: Janus WebSocket 시그널링 transport
//
// 흐름:
//   connect()  → 연결 태스크 spawn
//                  → WS 핸드셰이크 (subprotocol: janus-protocol)
//                  → 로그인 프레임 {"janus":"create","transaction":..,"credentials":{..}}
//                  → 같은 transaction 의 success 수신 시 SignedIn + 서버 피어(id 0) 등록
//   송신       → writer 채널 → WS, 프레임 1건당 MessageSent{ok} 1건
//   수신       → MessageFromPeer{peer: 0} (로그인 응답만 transport 가 소비)
//   keepalive  → KEEPALIVE_INTERVAL_MS 주기 {"janus":"keepalive"}
//   종료       → Disconnected (sign_out / 서버 close / 에러 공통)
//
// 서버 자체가 유일한 통화 상대: peer id 는 항상 SIGNALING_SERVER_PEER_ID.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use crate::config;
use crate::core::conductor::ConductorEvent;
use crate::core::state::PeerId;
use crate::signaling::{Credentials, PeerEntry, PeerRoster, SignalingTransport, TransportEvent};
use crate::utils::random_token;

enum Outgoing {
    /// completion=true 면 MessageSent 보고 대상 (send_to_peer)
    Frame { text: String, completion: bool },
    Close,
}

struct Shared {
    url:       String,
    events:    mpsc::UnboundedSender<ConductorEvent>,
    connected: AtomicBool,
    sending:   AtomicBool,
    roster:    PeerRoster,
    writer:    Mutex<Option<mpsc::Sender<Outgoing>>>,
}

impl Shared {
    fn emit(&self, event: TransportEvent) {
        if self.events.send(ConductorEvent::Transport(event)).is_err() {
            debug!("[ws] owner loop gone, transport event dropped");
        }
    }

    fn server_peer() -> PeerId {
        PeerId(config::SIGNALING_SERVER_PEER_ID)
    }
}

pub struct WsSignalingClient {
    shared: Arc<Shared>,
}

impl WsSignalingClient {
    pub fn new(url: impl Into<String>, events: mpsc::UnboundedSender<ConductorEvent>) -> Self {
        Self {
            shared: Arc::new(Shared {
                url:       url.into(),
                events,
                connected: AtomicBool::new(false),
                sending:   AtomicBool::new(false),
                roster:    PeerRoster::new(),
                writer:    Mutex::new(None),
            }),
        }
    }

    fn push(&self, outgoing: Outgoing) -> bool {
        let writer = self.shared.writer.lock();
        match writer.as_ref() {
            Some(tx) => tx.try_send(outgoing).is_ok(),
            None     => false,
        }
    }
}

impl SignalingTransport for WsSignalingClient {
    fn connect(&self, credentials: &Credentials) {
        let mut writer = self.shared.writer.lock();
        if writer.is_some() {
            warn!("[ws] connect ignored: connection already in progress");
            return;
        }
        let (tx, rx) = mpsc::channel(config::TRANSPORT_QUEUE_SIZE);
        *writer = Some(tx);
        drop(writer);

        tokio::spawn(run_connection(Arc::clone(&self.shared), credentials.clone(), rx));
    }

    fn sign_out(&self) {
        if !self.push(Outgoing::Close) {
            debug!("[ws] sign_out without live connection");
        }
    }

    fn send_to_peer(&self, peer: PeerId, payload: Bytes) -> bool {
        if !self.is_connected() || peer != Shared::server_peer() {
            warn!("[ws] send_to_peer rejected: peer={} connected={}", peer, self.is_connected());
            return false;
        }
        if self.shared.sending.swap(true, Ordering::AcqRel) {
            warn!("[ws] send_to_peer rejected: previous message still in flight");
            return false;
        }
        let text = match String::from_utf8(payload.to_vec()) {
            Ok(t)  => t,
            Err(_) => {
                self.shared.sending.store(false, Ordering::Release);
                warn!("[ws] send_to_peer rejected: payload is not UTF-8");
                return false;
            }
        };
        if !self.push(Outgoing::Frame { text, completion: true }) {
            self.shared.sending.store(false, Ordering::Release);
            return false;
        }
        true
    }

    fn send_hang_up(&self, peer: PeerId) -> bool {
        if !self.is_connected() || peer != Shared::server_peer() {
            return false;
        }
        let frame = json!({ "janus": "hangup", "transaction": random_token(config::TRANSACTION_TOKEN_LEN) });
        self.push(Outgoing::Frame { text: frame.to_string(), completion: false })
    }

    fn is_sending(&self) -> bool {
        self.shared.sending.load(Ordering::Acquire)
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn peers(&self) -> Vec<PeerEntry> {
        self.shared.roster.list()
    }

    fn server(&self) -> String {
        self.shared.url.clone()
    }
}

// ----------------------------------------------------------------------------
// [연결 태스크]
// ----------------------------------------------------------------------------

async fn run_connection(shared: Arc<Shared>, credentials: Credentials, mut rx: mpsc::Receiver<Outgoing>) {
    let mut request = match shared.url.as_str().into_client_request() {
        Ok(r)  => r,
        Err(e) => {
            warn!("[ws] invalid signaling url {}: {}", shared.url, e);
            finish(&shared, TransportEvent::ServerConnectionFailure);
            return;
        }
    };
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(config::SIGNALING_SUBPROTOCOL),
    );

    let ws = match connect_async(request).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            warn!("[ws] connect to {} failed: {}", shared.url, e);
            finish(&shared, TransportEvent::ServerConnectionFailure);
            return;
        }
    };
    let (mut sink, mut stream) = ws.split();

    // 로그인 프레임
    let login_tx = random_token(config::TRANSACTION_TOKEN_LEN);
    let login = json!({
        "janus":       "create",
        "transaction": login_tx,
        "credentials": { "user": credentials.user, "secret": credentials.secret },
    });
    if let Err(e) = sink.send(Message::Text(login.to_string().into())).await {
        warn!("[ws] login frame send failed: {}", e);
        finish(&shared, TransportEvent::ServerConnectionFailure);
        return;
    }
    shared.connected.store(true, Ordering::Release);
    info!("[ws] connected to {} (user={})", shared.url, credentials.user);

    let mut signed_in = false;
    let keepalive_every = tokio::time::Duration::from_millis(config::KEEPALIVE_INTERVAL_MS);
    let mut keepalive = tokio::time::interval(keepalive_every);
    keepalive.tick().await; // 첫 틱 skip

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(Outgoing::Frame { text, completion }) => {
                        let result = sink.send(Message::Text(text.into())).await;
                        if completion {
                            shared.sending.store(false, Ordering::Release);
                            shared.emit(TransportEvent::MessageSent { ok: result.is_ok() });
                        }
                        if let Err(e) = result {
                            warn!("[ws] send failed: {}", e);
                            break;
                        }
                    }
                    Some(Outgoing::Close) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        info!("[ws] signed out from {}", shared.url);
                        break;
                    }
                }
            }
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(t))) => t,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("[ws] server closed connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("[ws] read error: {}", e);
                        break;
                    }
                };
                trace!("[ws] <<< {}", text.as_str());

                if !signed_in {
                    match login_reply(text.as_str(), &login_tx) {
                        LoginReply::Accepted => {
                            signed_in = true;
                            shared.roster.add(Shared::server_peer(), config::SIGNALING_SERVER_PEER_NAME);
                            shared.emit(TransportEvent::SignedIn);
                            shared.emit(TransportEvent::PeerConnected {
                                id:   Shared::server_peer(),
                                name: config::SIGNALING_SERVER_PEER_NAME.to_string(),
                            });
                            continue;
                        }
                        LoginReply::Rejected(reason) => {
                            warn!("[ws] login rejected: {}", reason);
                            shared.connected.store(false, Ordering::Release);
                            shared.emit(TransportEvent::ServerConnectionFailure);
                            break;
                        }
                        LoginReply::Unrelated => {}
                    }
                }

                shared.emit(TransportEvent::MessageFromPeer {
                    peer:    Shared::server_peer(),
                    payload: Bytes::copy_from_slice(text.as_bytes()),
                });
            }
            _ = keepalive.tick(), if signed_in => {
                let frame = json!({ "janus": "keepalive", "transaction": random_token(config::TRANSACTION_TOKEN_LEN) });
                if let Err(e) = sink.send(Message::Text(frame.to_string().into())).await {
                    warn!("[ws] keepalive failed: {}", e);
                    break;
                }
            }
        }
    }

    if signed_in {
        shared.emit(TransportEvent::PeerDisconnected(Shared::server_peer()));
    }
    finish(&shared, TransportEvent::Disconnected);
}

/// 연결 태스크 종료 정리: 다음 connect() 를 허용
fn finish(shared: &Shared, event: TransportEvent) {
    shared.connected.store(false, Ordering::Release);
    shared.sending.store(false, Ordering::Release);
    shared.roster.clear();
    *shared.writer.lock() = None;
    shared.emit(event);
}

enum LoginReply {
    Accepted,
    Rejected(String),
    Unrelated,
}

fn login_reply(text: &str, login_tx: &str) -> LoginReply {
    let value: Value = match serde_json::from_str(text) {
        Ok(v)  => v,
        Err(_) => return LoginReply::Unrelated,
    };
    if value.get("transaction").and_then(Value::as_str) != Some(login_tx) {
        return LoginReply::Unrelated;
    }
    match value.get("janus").and_then(Value::as_str) {
        Some("success") => LoginReply::Accepted,
        Some("error") => {
            let reason = value
                .pointer("/error/reason")
                .and_then(Value::as_str)
                .unwrap_or("no reason given");
            LoginReply::Rejected(reason.to_string())
        }
        _ => LoginReply::Unrelated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_reply_matches_transaction() {
        assert!(matches!(
            login_reply(r#"{"janus":"success","transaction":"abc","data":{"id":1}}"#, "abc"),
            LoginReply::Accepted
        ));
        assert!(matches!(
            login_reply(r#"{"janus":"success","transaction":"other"}"#, "abc"),
            LoginReply::Unrelated
        ));
        assert!(matches!(login_reply("not json", "abc"), LoginReply::Unrelated));
    }

    #[test]
    fn login_error_carries_reason() {
        match login_reply(r#"{"janus":"error","transaction":"abc","error":{"code":403,"reason":"Unauthorized"}}"#, "abc") {
            LoginReply::Rejected(reason) => assert_eq!(reason, "Unauthorized"),
            _ => panic!("expected rejection"),
        }
    }

    #[test]
    fn send_before_connect_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = WsSignalingClient::new("ws://127.0.0.1:1", tx);
        assert!(!client.is_connected());
        assert!(!client.send_to_peer(PeerId(0), Bytes::from_static(b"{}")));
        assert!(!client.is_sending());
        assert!(!client.send_hang_up(PeerId(0)));
    }

    #[tokio::test]
    async fn unreachable_server_reports_connection_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let port = portpicker::pick_unused_port().expect("사용 가능한 포트를 찾을 수 없습니다.");
        let client = WsSignalingClient::new(format!("ws://127.0.0.1:{}", port), tx);

        client.connect(&Credentials::new("u", "s"));
        match rx.recv().await.unwrap() {
            ConductorEvent::Transport(event) => assert_eq!(event, TransportEvent::ServerConnectionFailure),
            _ => panic!("unexpected event"),
        }
        assert!(!client.is_connected());
    }
}
