// author: kodeholic
// Negotiation Event Dispatcher: DecodedMessage 를 협상 분기로 분류
//
// 우선순위:
//   1. type == "offer-loopback"         → LoopbackOffer (SDP 파싱 이전에 판정)
//   2. type == offer | answer           → Description (SDP 구조 검증)
//   3. candidate 세 필드                 → Candidate (candidate 라인 구조 검증)
//   4. janus hangup | detached          → PeerHangup
//   5. janus trickle                    → Candidate | EndOfCandidates
//   6. janus event + jsep               → Description (트랜잭션 동반)
//   7. 그 외                             → Envelope
//
// 구조가 깨진 payload 는 ConductorError::Parse: 호출 측이 로그 후 폐기한다.

use serde_json::Value;

use crate::error::{ConductorError, ConductorResult};
use crate::protocol::message::{
    DecodedMessage, EnvelopeKind, GenericEnvelope, IceCandidate, SdpType, SessionDescription,
    CANDIDATE_KEY, JSEP_KEY,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// 루프백 자가진단 요청
    LoopbackOffer,
    /// 원격 offer/answer. jsep 이벤트로 온 경우 해당 트랜잭션 토큰 동반
    Description {
        description: SessionDescription,
        transaction: Option<String>,
    },
    /// 원격 ICE candidate (trickle)
    Candidate(IceCandidate),
    /// 원격 candidate 수집 완료: 상태 변화 없음
    EndOfCandidates,
    /// 상대가 세션을 끊음
    PeerHangup { reason: Option<String> },
    /// ack / success / error / event 등 일반 봉투
    Envelope(GenericEnvelope),
}

impl Dispatch {
    /// 이 분기가 Idle 상태에서 새 세션을 열 수 있는지 여부
    pub fn opens_session(&self) -> bool {
        match self {
            Dispatch::Description { description, .. } => description.kind == SdpType::Offer,
            Dispatch::Candidate(_) => true,
            _ => false,
        }
    }
}

pub fn classify(message: DecodedMessage) -> ConductorResult<Dispatch> {
    match message {
        DecodedMessage::Description(description) => classify_description(description, None),
        DecodedMessage::Candidate(candidate)     => classify_candidate(candidate),
        DecodedMessage::Envelope(envelope)       => classify_envelope(envelope),
    }
}

fn classify_description(
    description: SessionDescription,
    transaction: Option<String>,
) -> ConductorResult<Dispatch> {
    if description.kind == SdpType::OfferLoopback {
        return Ok(Dispatch::LoopbackOffer);
    }
    validate_sdp(&description.sdp)?;
    Ok(Dispatch::Description { description, transaction })
}

fn classify_candidate(candidate: IceCandidate) -> ConductorResult<Dispatch> {
    if candidate.candidate.trim().is_empty() {
        return Ok(Dispatch::EndOfCandidates);
    }
    validate_candidate(&candidate.candidate)?;
    Ok(Dispatch::Candidate(candidate))
}

fn classify_envelope(envelope: GenericEnvelope) -> ConductorResult<Dispatch> {
    match envelope.kind {
        EnvelopeKind::Hangup | EnvelopeKind::Detached => {
            let reason = envelope.fields.get("reason").and_then(Value::as_str).map(str::to_string);
            Ok(Dispatch::PeerHangup { reason })
        }
        EnvelopeKind::Trickle => {
            let nested = envelope.fields.get(CANDIDATE_KEY).cloned().ok_or_else(|| {
                ConductorError::Parse("trickle without candidate".to_string())
            })?;
            if nested.get("completed").and_then(Value::as_bool) == Some(true) {
                return Ok(Dispatch::EndOfCandidates);
            }
            let candidate: IceCandidate = serde_json::from_value(nested)
                .map_err(|e| ConductorError::Parse(format!("trickle candidate: {}", e)))?;
            classify_candidate(candidate)
        }
        EnvelopeKind::Event if envelope.fields.contains_key(JSEP_KEY) => {
            let jsep = envelope.fields.get(JSEP_KEY).cloned().unwrap_or(Value::Null);
            let description: SessionDescription = serde_json::from_value(jsep)
                .map_err(|e| ConductorError::Parse(format!("jsep: {}", e)))?;
            classify_description(description, envelope.transaction)
        }
        _ => Ok(Dispatch::Envelope(envelope)),
    }
}

/// SDP 구조 검증: 비어있지 않고 첫 줄이 버전 라인(v=)이어야 한다.
/// 세부 파싱은 엔진 몫.
pub fn validate_sdp(sdp: &str) -> ConductorResult<()> {
    let first = sdp.lines().map(str::trim).find(|l| !l.is_empty());
    match first {
        Some(line) if line.starts_with("v=") => Ok(()),
        Some(line) => Err(ConductorError::Parse(format!("SDP must start with a version line, got {:?}", line))),
        None => Err(ConductorError::Parse("empty SDP payload".to_string())),
    }
}

/// candidate 라인 검증 (RFC 5245 grammar 최소 요건)
///   candidate:<foundation> <component> <transport> <priority> <ip> <port> typ <type> ...
pub fn validate_candidate(line: &str) -> ConductorResult<()> {
    let line = line.trim();
    let line = line.strip_prefix("a=").unwrap_or(line);
    let fields: Vec<&str> = line.split_whitespace().collect();

    let well_formed = fields.len() >= 8
        && fields[0].starts_with("candidate:")
        && fields[1].parse::<u16>().is_ok()
        && fields[3].parse::<u32>().is_ok()
        && fields[5].parse::<u16>().is_ok()
        && fields[6] == "typ";

    if well_formed {
        Ok(())
    } else {
        Err(ConductorError::Parse(format!("unparsable candidate {:?}", line)))
    }
}
