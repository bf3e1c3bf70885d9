// author: kodeholic
// 미디어 엔진 경계
//
// 엔진(코덱 협상, ICE, DTLS/SRTP, 캡처/렌더링)은 외부 구현체.
// 컨덕터는 MediaEngine 트레이트로만 명령을 내리고,
// 결과는 EngineSink 를 통해 owner 루프 채널로 다시 들어온다: 반환값으로 받지 않는다.

pub mod adapter;
pub mod synthetic;

use serde::Serialize;
use std::fmt;

use crate::config;
use crate::core::state::NegotiationMode;
use crate::protocol::message::{IceCandidate, SessionDescription};

pub use adapter::{EngineAdapter, EngineSink, SessionHandle};
pub use synthetic::SyntheticEngine;

// ----------------------------------------------------------------------------
// [트랙]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id:   String,
    pub kind: TrackKind,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self { id: id.into(), kind }
    }
}

// ----------------------------------------------------------------------------
// [엔진 → 컨덕터 이벤트]
// ----------------------------------------------------------------------------

/// 실패 보고용 엔진 명령 구분
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
    AddIceCandidate,
    AddLocalTracks,
}

impl fmt::Display for EngineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineOp::CreateOffer          => "create_offer",
            EngineOp::CreateAnswer         => "create_answer",
            EngineOp::SetLocalDescription  => "set_local_description",
            EngineOp::SetRemoteDescription => "set_remote_description",
            EngineOp::AddIceCandidate      => "add_ice_candidate",
            EngineOp::AddLocalTracks       => "add_local_tracks",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// create_offer / create_answer 완료
    LocalDescription(SessionDescription),
    /// 로컬 ICE candidate 수집
    LocalCandidate(IceCandidate),
    /// add_local_tracks 결과: 트랙당 1회
    LocalTrackAdded(MediaTrack),
    RemoteTrackAdded(MediaTrack),
    RemoteTrackRemoved(MediaTrack),
    /// 비동기 명령 실패: 협상 종료 사유
    Failed { op: EngineOp, reason: String },
}

impl EngineEvent {
    pub fn label(&self) -> &'static str {
        match self {
            EngineEvent::LocalDescription(_)   => "LOCAL_DESCRIPTION",
            EngineEvent::LocalCandidate(_)     => "LOCAL_CANDIDATE",
            EngineEvent::LocalTrackAdded(_)    => "LOCAL_TRACK",
            EngineEvent::RemoteTrackAdded(_)   => "REMOTE_TRACK_ADDED",
            EngineEvent::RemoteTrackRemoved(_) => "REMOTE_TRACK_REMOVED",
            EngineEvent::Failed { .. }         => "ENGINE_FAILED",
        }
    }
}

// ----------------------------------------------------------------------------
// [세션 설정]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub ice_servers:  Vec<String>,
    /// 루프백은 DTLS 핸드셰이크 생략
    pub dtls_enabled: bool,
    pub mode:         NegotiationMode,
}

impl SessionConfig {
    pub fn for_mode(mode: NegotiationMode) -> Self {
        Self {
            ice_servers:  vec![config::ICE_SERVER_URI.to_string()],
            dtls_enabled: mode.dtls_enabled(),
            mode,
        }
    }
}

// ----------------------------------------------------------------------------
// [MediaEngine]: 외부 엔진이 구현하는 명령 인터페이스
//
// open_session 만 동기 결과를 돌려준다 (세션 생성 실패 = InitializationFailure).
// 나머지는 완료/실패를 sink 이벤트로 보고한다.
// ----------------------------------------------------------------------------

pub trait MediaEngine: Send + Sync {
    fn open_session(
        &self,
        handle: SessionHandle,
        config: &SessionConfig,
        sink:   EngineSink,
    ) -> Result<(), String>;

    fn create_offer(&self, handle: SessionHandle);

    fn create_answer(&self, handle: SessionHandle);

    fn set_local_description(&self, handle: SessionHandle, description: SessionDescription);

    fn set_remote_description(&self, handle: SessionHandle, description: SessionDescription);

    fn add_ice_candidate(&self, handle: SessionHandle, candidate: IceCandidate);

    fn add_local_tracks(&self, handle: SessionHandle);

    fn close_session(&self, handle: SessionHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_follows_mode() {
        let normal = SessionConfig::for_mode(NegotiationMode::Normal);
        assert!(normal.dtls_enabled);
        assert_eq!(normal.ice_servers, vec![config::ICE_SERVER_URI.to_string()]);

        let loopback = SessionConfig::for_mode(NegotiationMode::Loopback);
        assert!(!loopback.dtls_enabled);
    }

    #[test]
    fn engine_op_names() {
        assert_eq!(EngineOp::CreateAnswer.to_string(), "create_answer");
        assert_eq!(EngineOp::SetRemoteDescription.to_string(), "set_remote_description");
    }
}
