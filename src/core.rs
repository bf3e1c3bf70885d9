// author: kodeholic
// 네트워크/엔진과 분리된 협상 상태 관리 모듈입니다.

pub mod conductor;
pub mod queue;
pub mod state;

pub use conductor::{Conductor, ConductorEvent};
pub use queue::{OutboundMessage, OutboundQueue};
pub use state::{
    Negotiation, NegotiationMode, PeerId, Role, SessionPhase, SessionSnapshot, SessionState,
};
