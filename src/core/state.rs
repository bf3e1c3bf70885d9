// author: kodeholic
// SessionState: 단일 협상의 생명주기
//
// 상태 전이:
//   Idle ──(피어 바인딩 + 엔진 세션 생성)──▶ Negotiating ──(local/remote 모두 set)──▶ Active
//     ▲                                            │                                   │
//     └─────────────────── teardown ───────────────┴───────────────────────────────────┘
//
// Idle 은 핸들/피어를 갖지 않는다: "세션 없음"을 타입으로 표현.
// loopback_pending 은 루프백 재초기화로 Negotiating 진입 시에만 set,
// 에코된 answer 적용 시 clear.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::SessionHandle;

// ----------------------------------------------------------------------------
// [PeerId]
// ----------------------------------------------------------------------------

/// 원격 피어 식별자 (시그널링 서버가 부여)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub i32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// [Role / NegotiationMode]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 로컬이 offer 를 만든다 (사용자 connect, 루프백)
    Offerer,
    /// 원격 offer 에 answer 로 응답
    Answerer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationMode {
    Normal,
    /// 로컬 offer 를 answer 로 되돌려 자가 협상, DTLS 비활성
    Loopback,
}

impl NegotiationMode {
    pub fn dtls_enabled(&self) -> bool {
        matches!(self, NegotiationMode::Normal)
    }
}

// ----------------------------------------------------------------------------
// [Negotiation]: Negotiating / Active 공통 데이터
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Negotiation {
    pub peer:                   PeerId,
    pub handle:                 SessionHandle,
    pub role:                   Role,
    pub mode:                   NegotiationMode,
    pub loopback_pending:       bool,
    pub local_description_set:  bool,
    pub remote_description_set: bool,
}

impl Negotiation {
    pub fn new(peer: PeerId, handle: SessionHandle, role: Role, mode: NegotiationMode) -> Self {
        Self {
            peer,
            handle,
            role,
            mode,
            loopback_pending:       false,
            local_description_set:  false,
            remote_description_set: false,
        }
    }

    pub fn is_loopback(&self) -> bool {
        self.mode == NegotiationMode::Loopback
    }

    fn both_descriptions_set(&self) -> bool {
        self.local_description_set && self.remote_description_set
    }
}

// ----------------------------------------------------------------------------
// [SessionState]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Negotiating,
    Active,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle        => f.write_str("idle"),
            SessionPhase::Negotiating => f.write_str("negotiating"),
            SessionPhase::Active      => f.write_str("active"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Negotiating(Negotiation),
    Active(Negotiation),
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle           => SessionPhase::Idle,
            SessionState::Negotiating(_) => SessionPhase::Negotiating,
            SessionState::Active(_)      => SessionPhase::Active,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn negotiation(&self) -> Option<&Negotiation> {
        match self {
            SessionState::Idle => None,
            SessionState::Negotiating(n) | SessionState::Active(n) => Some(n),
        }
    }

    pub fn negotiation_mut(&mut self) -> Option<&mut Negotiation> {
        match self {
            SessionState::Idle => None,
            SessionState::Negotiating(n) | SessionState::Active(n) => Some(n),
        }
    }

    pub fn peer(&self) -> Option<PeerId> {
        self.negotiation().map(|n| n.peer)
    }

    pub fn handle(&self) -> Option<SessionHandle> {
        self.negotiation().map(|n| n.handle)
    }

    /// Negotiating 이고 local/remote 모두 set 이면 Active 로 승격
    /// 승격됐으면 true
    pub fn promote(&mut self) -> bool {
        let ready = matches!(self, SessionState::Negotiating(n) if n.both_descriptions_set());
        if !ready {
            return false;
        }
        if let SessionState::Negotiating(n) = std::mem::take(self) {
            *self = SessionState::Active(n);
        }
        true
    }

    /// 상태를 Idle 로 되돌리고 이전 협상 데이터 반환
    pub fn take(&mut self) -> Option<Negotiation> {
        match std::mem::take(self) {
            SessionState::Idle => None,
            SessionState::Negotiating(n) | SessionState::Active(n) => Some(n),
        }
    }
}

// ----------------------------------------------------------------------------
// [SessionSnapshot]: 컨트롤 API / 테스트용 읽기 전용 사본
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase:                SessionPhase,
    pub peer:                 Option<PeerId>,
    pub role:                 Option<Role>,
    pub mode:                 Option<NegotiationMode>,
    pub loopback_pending:     bool,
    pub signed_in:            bool,
    pub queue_len:            usize,
    pub in_flight:            bool,
    pub pending_transactions: usize,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase:                SessionPhase::Idle,
            peer:                 None,
            role:                 None,
            mode:                 None,
            loopback_pending:     false,
            signed_in:            false,
            queue_len:            0,
            in_flight:            false,
            pending_transactions: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiating(role: Role) -> SessionState {
        SessionState::Negotiating(Negotiation::new(
            PeerId(7),
            SessionHandle::from_raw(1),
            role,
            NegotiationMode::Normal,
        ))
    }

    #[test]
    fn idle_has_no_peer_or_handle() {
        let state = SessionState::default();
        assert!(state.is_idle());
        assert_eq!(state.peer(), None);
        assert_eq!(state.handle(), None);
        assert_eq!(state.phase(), SessionPhase::Idle);
    }

    #[test]
    fn promote_requires_both_descriptions() {
        let mut state = negotiating(Role::Answerer);
        assert!(!state.promote());

        state.negotiation_mut().unwrap().remote_description_set = true;
        assert!(!state.promote());
        assert_eq!(state.phase(), SessionPhase::Negotiating);

        state.negotiation_mut().unwrap().local_description_set = true;
        assert!(state.promote());
        assert_eq!(state.phase(), SessionPhase::Active);
        assert_eq!(state.peer(), Some(PeerId(7)));

        // 이미 Active 면 재승격 없음
        assert!(!state.promote());
    }

    #[test]
    fn take_returns_to_idle() {
        let mut state = negotiating(Role::Offerer);
        let n = state.take().unwrap();
        assert_eq!(n.role, Role::Offerer);
        assert!(state.is_idle());
        assert!(state.take().is_none());
    }

    #[test]
    fn loopback_mode_disables_dtls() {
        assert!(NegotiationMode::Normal.dtls_enabled());
        assert!(!NegotiationMode::Loopback.dtls_enabled());
    }

    #[test]
    fn snapshot_serializes_lowercase() {
        let snap = SessionSnapshot { phase: SessionPhase::Negotiating, role: Some(Role::Answerer), ..Default::default() };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["phase"], "negotiating");
        assert_eq!(json["role"], "answerer");
        assert!(json["peer"].is_null());
    }
}
