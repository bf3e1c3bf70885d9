// author: kodeholic
// EngineAdapter: 상태 머신 명령 ↔ MediaEngine 호출 변환
//
// 세션마다 새 SessionHandle 발급 (단조 증가, 재사용 없음).
// 엔진 콜백은 EngineSink 가 핸들을 붙여 owner 루프 채널로 보낸다.
// 파괴된 세션의 늦은 콜백은 owner 루프가 핸들 비교로 폐기한다.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::conductor::ConductorEvent;
use crate::core::state::NegotiationMode;
use crate::engine::{EngineEvent, MediaEngine, SessionConfig};
use crate::error::{ConductorError, ConductorResult};
use crate::protocol::message::{IceCandidate, SessionDescription};

// ----------------------------------------------------------------------------
// [SessionHandle]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// [EngineSink]: 엔진 콜백 진입점 (엔진 스레드에서 호출 가능)
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct EngineSink {
    session: SessionHandle,
    tx:      mpsc::UnboundedSender<ConductorEvent>,
}

impl EngineSink {
    pub fn new(session: SessionHandle, tx: mpsc::UnboundedSender<ConductorEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionHandle {
        self.session
    }

    /// owner 루프로 이벤트 전달. 루프가 이미 종료됐으면 조용히 버린다
    pub fn emit(&self, event: EngineEvent) {
        if self.tx.send(ConductorEvent::Engine { session: self.session, event }).is_err() {
            debug!("[engine] owner loop gone, dropping callback for session {}", self.session);
        }
    }
}

// ----------------------------------------------------------------------------
// [EngineAdapter]
// ----------------------------------------------------------------------------

pub struct EngineAdapter {
    engine:      Arc<dyn MediaEngine>,
    events:      mpsc::UnboundedSender<ConductorEvent>,
    next_handle: u64,
    current:     Option<SessionHandle>,
}

impl EngineAdapter {
    pub fn new(engine: Arc<dyn MediaEngine>, events: mpsc::UnboundedSender<ConductorEvent>) -> Self {
        Self { engine, events, next_handle: 1, current: None }
    }

    pub fn current(&self) -> Option<SessionHandle> {
        self.current
    }

    /// 엔진 세션 생성 (동기). 실패 시 InitializationFailure
    pub fn create_session(&mut self, mode: NegotiationMode) -> ConductorResult<SessionHandle> {
        if let Some(stale) = self.current {
            warn!("[engine] session {} still open on create, closing it first", stale);
            self.destroy_session(stale);
        }

        let handle = SessionHandle(self.next_handle);
        self.next_handle += 1;

        let config = SessionConfig::for_mode(mode);
        let sink   = EngineSink::new(handle, self.events.clone());
        self.engine
            .open_session(handle, &config, sink)
            .map_err(ConductorError::InitializationFailure)?;

        debug!("[engine] session {} opened (mode={:?}, dtls={})", handle, mode, config.dtls_enabled);
        self.current = Some(handle);
        Ok(handle)
    }

    pub fn request_offer(&self, handle: SessionHandle) {
        if self.accepts(handle, "request_offer") {
            self.engine.create_offer(handle);
        }
    }

    pub fn request_answer(&self, handle: SessionHandle) {
        if self.accepts(handle, "request_answer") {
            self.engine.create_answer(handle);
        }
    }

    pub fn set_local_description(&self, handle: SessionHandle, description: SessionDescription) {
        if self.accepts(handle, "set_local_description") {
            self.engine.set_local_description(handle, description);
        }
    }

    pub fn set_remote_description(&self, handle: SessionHandle, description: SessionDescription) {
        if self.accepts(handle, "set_remote_description") {
            self.engine.set_remote_description(handle, description);
        }
    }

    pub fn add_ice_candidate(&self, handle: SessionHandle, candidate: IceCandidate) {
        if self.accepts(handle, "add_ice_candidate") {
            self.engine.add_ice_candidate(handle, candidate);
        }
    }

    pub fn add_local_tracks(&self, handle: SessionHandle) {
        if self.accepts(handle, "add_local_tracks") {
            self.engine.add_local_tracks(handle);
        }
    }

    /// 엔진 세션 파괴 (동기). 현재 세션이 아니어도 엔진에는 close 를 전달한다
    pub fn destroy_session(&mut self, handle: SessionHandle) {
        self.engine.close_session(handle);
        if self.current == Some(handle) {
            self.current = None;
        }
        debug!("[engine] session {} closed", handle);
    }

    fn accepts(&self, handle: SessionHandle, op: &str) -> bool {
        if self.current == Some(handle) {
            return true;
        }
        warn!("[engine] {} for stale session {} ignored (current={:?})", op, handle, self.current);
        false
    }
}
