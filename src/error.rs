// author: kodeholic

use std::fmt;

#[derive(Debug)]
pub enum ConductorError {
    /// 와이어 메시지 구조 오류: 로그 후 폐기
    Parse(String),
    /// 다른 피어 / 잘못된 역할·상태의 메시지: 로그 후 폐기
    ProtocolViolation(String),
    /// 엔진이 offer/answer/candidate 를 거부: 세션 종료
    NegotiationFailure(String),
    /// 송신 실패 / 연결 끊김: 세션 종료 + sign out
    TransportFailure(String),
    /// 엔진 세션 생성 실패: 세션이 없으므로 teardown 불필요
    InitializationFailure(String),
    IoError(std::io::Error),
}

impl ConductorError {
    /// 세션을 끝내야 하는 에러인지 여부
    /// Parse / ProtocolViolation 은 감지한 곳에서 흡수된다.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConductorError::Parse(_) | ConductorError::ProtocolViolation(_))
    }
}

impl fmt::Display for ConductorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConductorError::Parse(msg) => write!(f, "Malformed signaling message: {}", msg),
            ConductorError::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            ConductorError::NegotiationFailure(msg) => write!(f, "Negotiation failed: {}", msg),
            ConductorError::TransportFailure(msg) => write!(f, "Signaling transport failed: {}", msg),
            ConductorError::InitializationFailure(msg) => write!(f, "Failed to initialize engine session: {}", msg),
            ConductorError::IoError(err) => write!(f, "Network I/O error: {}", err),
        }
    }
}

impl std::error::Error for ConductorError {}

impl From<std::io::Error> for ConductorError {
    fn from(err: std::io::Error) -> Self {
        ConductorError::IoError(err)
    }
}

pub type ConductorResult<T> = Result<T, ConductorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_are_not_terminal() {
        assert!(!ConductorError::Parse("x".into()).is_terminal());
        assert!(!ConductorError::ProtocolViolation("x".into()).is_terminal());
    }

    #[test]
    fn session_ending_errors_are_terminal() {
        assert!(ConductorError::NegotiationFailure("x".into()).is_terminal());
        assert!(ConductorError::TransportFailure("x".into()).is_terminal());
        assert!(ConductorError::InitializationFailure("x".into()).is_terminal());
    }

    #[test]
    fn display_includes_reason() {
        let err = ConductorError::NegotiationFailure("answer rejected".into());
        assert!(err.to_string().contains("answer rejected"));
    }
}
