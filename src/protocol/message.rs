// author: kodeholic

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ----------------------------------------------------------------------------
// [와이어 필드명]
// ----------------------------------------------------------------------------

pub const TYPE_KEY:            &str = "type";
pub const SDP_KEY:             &str = "sdp";
pub const SDP_MID_KEY:         &str = "sdpMid";
pub const SDP_MLINE_INDEX_KEY: &str = "sdpMLineIndex";
pub const CANDIDATE_KEY:       &str = "candidate";
pub const JANUS_KEY:           &str = "janus";
pub const TRANSACTION_KEY:     &str = "transaction";
pub const JSEP_KEY:            &str = "jsep";

/// candidate 메시지를 식별하는 필드 목록 (type 필드가 없을 때만 적용)
pub const CANDIDATE_KEYS: [&str; 3] = [SDP_MID_KEY, SDP_MLINE_INDEX_KEY, CANDIDATE_KEY];

// ----------------------------------------------------------------------------
// [SessionDescription]
//   { "type": "offer"|"answer"|"offer-loopback", "sdp": "<payload>" }
// ----------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    #[serde(rename = "offer")]
    Offer,
    #[serde(rename = "answer")]
    Answer,
    /// 루프백 자가진단 마커: sdp 없이 단독으로 온다
    #[serde(rename = "offer-loopback")]
    OfferLoopback,
}

impl SdpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpType::Offer         => "offer",
            SdpType::Answer        => "answer",
            SdpType::OfferLoopback => "offer-loopback",
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sdp:  String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpType::Offer, sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpType::Answer, sdp: sdp.into() }
    }

    /// 같은 SDP를 answer 태그로 바꾼 사본 (루프백 재주입용)
    pub fn to_answer(&self) -> Self {
        Self::answer(self.sdp.clone())
    }
}

// ----------------------------------------------------------------------------
// [IceCandidate]
//   { "sdpMid": "<mid>", "sdpMLineIndex": <int>, "candidate": "<payload>" }
// ----------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IceCandidate {
    #[serde(rename = "sdpMid")]
    pub sdp_mid:         String,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: u32,
    pub candidate:       String,
}

// ----------------------------------------------------------------------------
// [GenericEnvelope]: Janus 스타일 봉투
//   { "janus": "<kind>", "transaction": "<token>", ... }
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    Ack,
    Success,
    Error,
    Event,
    Keepalive,
    Webrtcup,
    Hangup,
    Detached,
    Media,
    Slowlink,
    Trickle,
    /// 알 수 없는 kind: 원문 보존 (janus 필드가 없으면 빈 문자열)
    Other(String),
}

impl EnvelopeKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "ack"       => EnvelopeKind::Ack,
            "success"   => EnvelopeKind::Success,
            "error"     => EnvelopeKind::Error,
            "event"     => EnvelopeKind::Event,
            "keepalive" => EnvelopeKind::Keepalive,
            "webrtcup"  => EnvelopeKind::Webrtcup,
            "hangup"    => EnvelopeKind::Hangup,
            "detached"  => EnvelopeKind::Detached,
            "media"     => EnvelopeKind::Media,
            "slowlink"  => EnvelopeKind::Slowlink,
            "trickle"   => EnvelopeKind::Trickle,
            other       => EnvelopeKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeKind::Ack       => "ack",
            EnvelopeKind::Success   => "success",
            EnvelopeKind::Error     => "error",
            EnvelopeKind::Event     => "event",
            EnvelopeKind::Keepalive => "keepalive",
            EnvelopeKind::Webrtcup  => "webrtcup",
            EnvelopeKind::Hangup    => "hangup",
            EnvelopeKind::Detached  => "detached",
            EnvelopeKind::Media     => "media",
            EnvelopeKind::Slowlink  => "slowlink",
            EnvelopeKind::Trickle   => "trickle",
            EnvelopeKind::Other(k)  => k.as_str(),
        }
    }

    /// 대기 중 트랜잭션에 대한 응답이 될 수 있는 kind
    pub fn resolves_transaction(&self) -> bool {
        matches!(
            self,
            EnvelopeKind::Ack | EnvelopeKind::Success | EnvelopeKind::Error | EnvelopeKind::Event
        )
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeKind::Other(k) if k.is_empty() => f.write_str("<none>"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericEnvelope {
    pub kind:        EnvelopeKind,
    /// 상관관계 토큰: success/error 를 보낸 요청과 매칭
    pub transaction: Option<String>,
    /// janus / transaction 을 제외한 나머지 필드
    pub fields:      Map<String, Value>,
}

impl GenericEnvelope {
    pub fn new(kind: EnvelopeKind) -> Self {
        Self { kind, transaction: None, fields: Map::new() }
    }

    /// error 봉투의 사유: { "error": { "code": .., "reason": ".." } }
    pub fn error_reason(&self) -> String {
        self.fields
            .get("error")
            .and_then(|e| e.get("reason"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "no reason given".to_string())
    }
}

// ----------------------------------------------------------------------------
// [DecodedMessage]: 코덱 출력 (세 가지 와이어 형태의 tagged union)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Description(SessionDescription),
    Candidate(IceCandidate),
    Envelope(GenericEnvelope),
}

impl DecodedMessage {
    /// 로그/트레이스용 짧은 이름
    pub fn label(&self) -> String {
        match self {
            DecodedMessage::Description(d) => d.kind.as_str().to_uppercase(),
            DecodedMessage::Candidate(_)   => "CANDIDATE".to_string(),
            DecodedMessage::Envelope(e)    => format!("JANUS_{}", e.kind).to_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdp_type_wire_names() {
        assert_eq!(serde_json::to_string(&SdpType::OfferLoopback).unwrap(), "\"offer-loopback\"");
        let t: SdpType = serde_json::from_str("\"answer\"").unwrap();
        assert_eq!(t, SdpType::Answer);
    }

    #[test]
    fn to_answer_swaps_tag_and_keeps_sdp() {
        let offer = SessionDescription::offer("v=0\r\n");
        let answer = offer.to_answer();
        assert_eq!(answer.kind, SdpType::Answer);
        assert_eq!(answer.sdp, offer.sdp);
    }

    #[test]
    fn unknown_envelope_kind_keeps_raw_text() {
        let kind = EnvelopeKind::parse("timeout");
        assert_eq!(kind, EnvelopeKind::Other("timeout".into()));
        assert_eq!(kind.as_str(), "timeout");
    }

    #[test]
    fn only_replies_resolve_transactions() {
        for kind in ["ack", "success", "error", "event"] {
            assert!(EnvelopeKind::parse(kind).resolves_transaction(), "{}", kind);
        }
        for kind in ["keepalive", "webrtcup", "media", "slowlink", "trickle", "timeout"] {
            assert!(!EnvelopeKind::parse(kind).resolves_transaction(), "{}", kind);
        }
    }

    #[test]
    fn error_reason_falls_back() {
        let mut env = GenericEnvelope::new(EnvelopeKind::Error);
        assert_eq!(env.error_reason(), "no reason given");
        env.fields.insert("error".into(), serde_json::json!({ "code": 458, "reason": "No such session" }));
        assert_eq!(env.error_reason(), "No such session");
    }
}
