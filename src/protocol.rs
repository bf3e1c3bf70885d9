// author: kodeholic

pub mod codec;
pub mod dispatch;
pub mod message;
pub mod transaction;

pub use codec::{decode, encode, encode_with_transaction};
pub use dispatch::{classify, Dispatch};
pub use message::{
    DecodedMessage, EnvelopeKind, GenericEnvelope, IceCandidate, SdpType, SessionDescription,
};
pub use transaction::{PendingKind, PendingTransaction, TransactionMap};
