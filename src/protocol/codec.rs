// author: kodeholic
// Message Codec: 와이어 바이트 ↔ DecodedMessage
//
// 형태 판별 순서:
//   1. "janus" 필드       → GenericEnvelope
//   2. "type" 필드        → SessionDescription
//   3. candidate 필드 중 하나라도 → IceCandidate (세 필드 모두 필수)
//   4. 그 외               → GenericEnvelope(kind 없음)
//
// 상태 없음. 실패는 ConductorError::Parse 로만 보고하고 부분 값은 절대 넘기지 않는다.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ConductorError, ConductorResult};
use crate::protocol::message::{
    DecodedMessage, EnvelopeKind, GenericEnvelope, CANDIDATE_KEYS, JANUS_KEY, TRANSACTION_KEY,
    TYPE_KEY,
};

pub fn decode(bytes: &[u8]) -> ConductorResult<DecodedMessage> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ConductorError::Parse(e.to_string()))?;

    let object = match value {
        Value::Object(map) => map,
        other => {
            return Err(ConductorError::Parse(format!("expected a JSON object, got {}", kind_of(&other))));
        }
    };

    if object.contains_key(JANUS_KEY) {
        return decode_envelope(object).map(DecodedMessage::Envelope);
    }
    if object.contains_key(TYPE_KEY) {
        return from_object(object).map(DecodedMessage::Description);
    }
    if CANDIDATE_KEYS.iter().any(|k| object.contains_key(*k)) {
        return from_object(object).map(DecodedMessage::Candidate);
    }

    Ok(DecodedMessage::Envelope(GenericEnvelope {
        kind:        EnvelopeKind::Other(String::new()),
        transaction: None,
        fields:      object,
    }))
}

pub fn encode(message: &DecodedMessage) -> Bytes {
    Bytes::from(serde_json::to_vec(&to_value(message)).unwrap_or_default())
}

/// 송신용 인코딩: 상관관계 토큰을 "transaction" 필드로 덧붙인다
pub fn encode_with_transaction(message: &DecodedMessage, transaction: &str) -> Bytes {
    let mut value = to_value(message);
    if let Value::Object(map) = &mut value {
        map.insert(TRANSACTION_KEY.to_string(), Value::String(transaction.to_string()));
    }
    Bytes::from(serde_json::to_vec(&value).unwrap_or_default())
}

// ----------------------------------------------------------------------------
// [내부 유틸]
// ----------------------------------------------------------------------------

fn decode_envelope(mut object: Map<String, Value>) -> ConductorResult<GenericEnvelope> {
    let kind = match object.remove(JANUS_KEY) {
        Some(Value::String(k)) => EnvelopeKind::parse(&k),
        Some(other) => {
            return Err(ConductorError::Parse(format!("\"janus\" must be a string, got {}", kind_of(&other))));
        }
        None => EnvelopeKind::Other(String::new()),
    };

    let transaction = match object.remove(TRANSACTION_KEY) {
        Some(Value::String(t)) => Some(t),
        Some(Value::Null) | None => None,
        Some(other) => {
            return Err(ConductorError::Parse(format!("\"transaction\" must be a string, got {}", kind_of(&other))));
        }
    };

    Ok(GenericEnvelope { kind, transaction, fields: object })
}

fn from_object<T: DeserializeOwned>(object: Map<String, Value>) -> ConductorResult<T> {
    serde_json::from_value(Value::Object(object)).map_err(|e| ConductorError::Parse(e.to_string()))
}

fn to_value(message: &DecodedMessage) -> Value {
    match message {
        DecodedMessage::Description(d) => serde_json::to_value(d).unwrap_or(Value::Null),
        DecodedMessage::Candidate(c)   => serde_json::to_value(c).unwrap_or(Value::Null),
        DecodedMessage::Envelope(e) => {
            let mut map = Map::new();
            let kind = e.kind.as_str();
            if !kind.is_empty() {
                map.insert(JANUS_KEY.to_string(), Value::String(kind.to_string()));
            }
            if let Some(t) = &e.transaction {
                map.insert(TRANSACTION_KEY.to_string(), Value::String(t.clone()));
            }
            for (k, v) in &e.fields {
                map.insert(k.clone(), v.clone());
            }
            Value::Object(map)
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null      => "null",
        Value::Bool(_)   => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_)  => "array",
        Value::Object(_) => "object",
    }
}
