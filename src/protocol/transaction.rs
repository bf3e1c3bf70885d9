// author: kodeholic
// TransactionMap: 송신 요청 ↔ success/error 응답 상관관계 테이블
//
// 토큰은 송신 시 발급, 응답 수신 시 resolve 로 제거한다.
// 응답이 오지 않은 토큰은 reaper 주기마다 expire 로 정리 (TRANSACTION_TIMEOUT_MS).
// 매칭되지 않는 토큰은 호출 측이 로그 후 폐기: 항상 매칭된다고 가정하지 않는다.

use std::collections::HashMap;
use std::fmt;

use crate::config;
use crate::engine::SessionHandle;
use crate::protocol::message::SdpType;
use crate::utils::{current_timestamp, random_token};

/// 응답을 기다리는 송신 요청 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Offer,
    Answer,
    Candidate,
}

impl PendingKind {
    pub fn for_sdp(kind: SdpType) -> Self {
        match kind {
            SdpType::Answer => PendingKind::Answer,
            _               => PendingKind::Offer,
        }
    }

    /// 상대가 거부하면 협상 자체가 깨지는 요청인지
    pub fn is_description(&self) -> bool {
        matches!(self, PendingKind::Offer | PendingKind::Answer)
    }
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingKind::Offer     => f.write_str("offer"),
            PendingKind::Answer    => f.write_str("answer"),
            PendingKind::Candidate => f.write_str("candidate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransaction {
    pub kind:       PendingKind,
    /// 요청을 만든 엔진 세션: 세션 종료 후 도착한 응답 판별용
    pub session:    SessionHandle,
    pub created_at: u64,
}

pub struct TransactionMap {
    pending: HashMap<String, PendingTransaction>,
}

impl TransactionMap {
    pub fn new() -> Self {
        Self { pending: HashMap::new() }
    }

    /// 새 토큰 발급 + 등록
    pub fn register(&mut self, kind: PendingKind, session: SessionHandle) -> String {
        let mut token = random_token(config::TRANSACTION_TOKEN_LEN);
        while self.pending.contains_key(&token) {
            token = random_token(config::TRANSACTION_TOKEN_LEN);
        }
        self.pending.insert(token.clone(), PendingTransaction {
            kind,
            session,
            created_at: current_timestamp(),
        });
        token
    }

    pub fn peek(&self, token: &str) -> Option<&PendingTransaction> {
        self.pending.get(token)
    }

    /// 응답 수신: 매칭되면 제거 후 반환
    pub fn resolve(&mut self, token: &str) -> Option<PendingTransaction> {
        self.pending.remove(token)
    }

    /// timeout_ms 이상 응답 없는 토큰 제거 후 반환
    pub fn expire(&mut self, now: u64, timeout_ms: u64) -> Vec<(String, PendingTransaction)> {
        let stale: Vec<String> = self.pending
            .iter()
            .filter(|(_, p)| now.saturating_sub(p.created_at) >= timeout_ms)
            .map(|(token, _)| token.clone())
            .collect();

        stale.into_iter()
            .filter_map(|token| self.pending.remove(&token).map(|p| (token, p)))
            .collect()
    }

    /// 세션 종료 시 해당 세션 토큰 일괄 제거, 제거 수 반환
    pub fn drop_session(&mut self, session: SessionHandle) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| p.session != session);
        before - self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for TransactionMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_resolve_once() {
        let mut map = TransactionMap::new();
        let token = map.register(PendingKind::Offer, SessionHandle::from_raw(1));
        assert_eq!(token.len(), config::TRANSACTION_TOKEN_LEN);

        let p = map.resolve(&token).unwrap();
        assert_eq!(p.kind, PendingKind::Offer);
        assert!(map.resolve(&token).is_none(), "두 번째 응답은 매칭되지 않아야 합니다.");
    }

    #[test]
    fn unknown_token_does_not_match() {
        let mut map = TransactionMap::new();
        map.register(PendingKind::Candidate, SessionHandle::from_raw(1));
        assert!(map.resolve("nope").is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn expire_removes_only_stale_entries() {
        let mut map = TransactionMap::new();
        let token = map.register(PendingKind::Answer, SessionHandle::from_raw(1));
        let created = current_timestamp();

        assert!(map.expire(created, 30_000).is_empty());

        let expired = map.expire(created + 60_000, 30_000);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, token);
        assert!(map.is_empty());
    }

    #[test]
    fn drop_session_keeps_other_sessions() {
        let mut map = TransactionMap::new();
        map.register(PendingKind::Offer, SessionHandle::from_raw(1));
        map.register(PendingKind::Candidate, SessionHandle::from_raw(1));
        map.register(PendingKind::Offer, SessionHandle::from_raw(2));

        assert_eq!(map.drop_session(SessionHandle::from_raw(1)), 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn pending_kind_for_sdp() {
        assert_eq!(PendingKind::for_sdp(SdpType::Offer), PendingKind::Offer);
        assert_eq!(PendingKind::for_sdp(SdpType::Answer), PendingKind::Answer);
        assert!(PendingKind::Answer.is_description());
        assert!(!PendingKind::Candidate.is_description());
    }
}
