//! The duration-coded signal vocabulary
//!
//! A controller "speaks" by holding a line active for a nominal duration;
//! peers infer the message type purely from how long the line stayed high.

use std::fmt::{self, Display};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::LineName;

/// The three handshake signals, ordered by nominal duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Initiator's opening signal
    Syn,
    /// Responder's answer
    SynAck,
    /// Initiator's confirmation
    Ack,
}

impl Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Syn => write!(f, "SYN"),
            SignalKind::SynAck => write!(f, "SYN_ACK"),
            SignalKind::Ack => write!(f, "ACK"),
        }
    }
}

/// A pulse the monitor measured and classified
///
/// Produced by the line monitor, consumed exactly once by the negotiation
/// engine, discarded after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSignal {
    /// Line the pulse was observed on
    pub line: LineName,
    /// Classified signal kind
    pub kind: SignalKind,
    /// Measured high-time of the pulse
    pub measured: Duration,
}
