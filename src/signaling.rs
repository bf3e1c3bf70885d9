// author: kodeholic
// 시그널링 transport 경계
//
// 컨덕터는 SignalingTransport 로 송신하고,
// transport 는 TransportEvent 를 owner 루프 채널(ConductorEvent::Transport)로 올린다.
// send_to_peer 1건당 MessageSent 완료 알림 1건: OutboundQueue 의 다음 drain 트리거.

pub mod ws;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::core::state::PeerId;

pub use ws::WsSignalingClient;

// ----------------------------------------------------------------------------
// [자격증명]
// ----------------------------------------------------------------------------

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub user:   String,
    pub secret: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { user: user.into(), secret: secret.into() }
    }
}

// secret 은 로그에 남기지 않는다
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("secret", &"***")
            .finish()
    }
}

// ----------------------------------------------------------------------------
// [피어 목록]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerEntry {
    pub id:   PeerId,
    pub name: String,
}

/// 접속 중인 피어 목록 (transport 소유, 여러 태스크에서 접근)
pub struct PeerRoster {
    peers: Mutex<BTreeMap<i32, String>>,
}

impl PeerRoster {
    pub fn new() -> Self {
        Self { peers: Mutex::new(BTreeMap::new()) }
    }

    /// 신규 피어면 true
    pub fn add(&self, id: PeerId, name: &str) -> bool {
        self.peers.lock().insert(id.0, name.to_string()).is_none()
    }

    pub fn remove(&self, id: PeerId) -> bool {
        self.peers.lock().remove(&id.0).is_some()
    }

    pub fn clear(&self) {
        self.peers.lock().clear();
    }

    /// id 오름차순
    pub fn list(&self) -> Vec<PeerEntry> {
        self.peers
            .lock()
            .iter()
            .map(|(id, name)| PeerEntry { id: PeerId(*id), name: name.clone() })
            .collect()
    }
}

impl Default for PeerRoster {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// [TransportEvent]: transport → owner 루프
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    SignedIn,
    PeerConnected { id: PeerId, name: String },
    PeerDisconnected(PeerId),
    MessageFromPeer { peer: PeerId, payload: Bytes },
    /// send_to_peer 완료 (성공/실패)
    MessageSent { ok: bool },
    Disconnected,
    ServerConnectionFailure,
}

impl TransportEvent {
    pub fn label(&self) -> &'static str {
        match self {
            TransportEvent::SignedIn                => "SIGNED_IN",
            TransportEvent::PeerConnected { .. }    => "PEER_CONNECTED",
            TransportEvent::PeerDisconnected(_)     => "PEER_DISCONNECTED",
            TransportEvent::MessageFromPeer { .. }  => "MESSAGE",
            TransportEvent::MessageSent { .. }      => "MESSAGE_SENT",
            TransportEvent::Disconnected            => "DISCONNECTED",
            TransportEvent::ServerConnectionFailure => "CONNECTION_FAILURE",
        }
    }
}

// ----------------------------------------------------------------------------
// [SignalingTransport]: owner 루프에서 호출, 절대 블로킹하지 않는다
// ----------------------------------------------------------------------------

pub trait SignalingTransport: Send + Sync {
    /// 접속 + 로그인 시작. 결과는 SignedIn / ServerConnectionFailure 이벤트
    fn connect(&self, credentials: &Credentials);

    /// 로그아웃 + 연결 종료. 완료 시 Disconnected 이벤트
    fn sign_out(&self);

    /// 송신 개시 여부. true 면 MessageSent 이벤트가 반드시 뒤따른다
    fn send_to_peer(&self, peer: PeerId, payload: Bytes) -> bool;

    /// 통화 종료 알림 (완료 이벤트 없음)
    fn send_hang_up(&self, peer: PeerId) -> bool;

    fn is_sending(&self) -> bool;

    fn is_connected(&self) -> bool;

    fn peers(&self) -> Vec<PeerEntry>;

    /// 접속 대상 표시용 (UI 알림 문구)
    fn server(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_tracks_peers_in_id_order() {
        let roster = PeerRoster::new();
        assert!(roster.add(PeerId(9), "bob"));
        assert!(roster.add(PeerId(3), "alice"));
        assert!(!roster.add(PeerId(3), "alice"));

        let list = roster.list();
        assert_eq!(list[0], PeerEntry { id: PeerId(3), name: "alice".into() });
        assert_eq!(list.len(), 2);

        assert!(roster.remove(PeerId(9)));
        assert!(!roster.remove(PeerId(9)));
        roster.clear();
        assert!(roster.list().is_empty());
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let c = Credentials::new("1234", "hunter2");
        let dbg = format!("{:?}", c);
        assert!(dbg.contains("1234"));
        assert!(!dbg.contains("hunter2"));
    }
}
