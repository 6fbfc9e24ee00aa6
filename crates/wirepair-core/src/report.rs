//! Externally reported results
//!
//! The negotiation engine reports each tested line as it finalizes, and a
//! completion summary once every visible line is tested. Consumers must
//! tolerate partial results after an early stop; the completion report is
//! only emitted when every line is tested.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::identity::{ControllerId, LineName};

/// Role a controller ends up with on a successfully paired line
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[display("initiator")]
    Initiator,
    #[display("responder")]
    Responder,
}

/// Outcome of testing one line
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineStatus {
    #[display("WORKING")]
    Working,
    #[display("FAILED")]
    Failed,
}

/// Why a line ended up blacklisted
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Explicitly blacklisted
    #[display("blacklisted")]
    Blacklisted,
    /// Too many false responses (activity that never decoded to a signal)
    #[display("disturbed")]
    Disturbed,
    /// An expected handshake signal never arrived
    #[display("timeout")]
    Timeout,
}

/// Read-only copy of one pin record, safe to hand to collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSnapshot {
    pub line: LineName,
    /// A SYN was seen (or sent) on this line
    pub syn: bool,
    /// A SYN_ACK was seen (or sent) on this line
    pub syn_ack: bool,
    /// An ACK was seen (or sent) on this line
    pub ack: bool,
    pub role: Option<Role>,
    pub false_responses: u32,
    pub blacklisted: bool,
    pub successful: bool,
    pub failure: Option<FailureReason>,
}

impl PinSnapshot {
    /// A pin is tested once it has either paired or been blacklisted
    pub fn is_tested(&self) -> bool {
        self.successful || self.blacklisted
    }
}

/// One message on a controller's outbound report channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControllerReport {
    /// A line finished testing (in either direction)
    LineTested {
        controller: ControllerId,
        line: LineName,
        status: LineStatus,
        role: Option<Role>,
        timestamp: DateTime<Utc>,
    },
    /// Every visible line is tested
    Completed {
        controller: ControllerId,
        timestamp: DateTime<Utc>,
        /// Successful, non-blacklisted pins
        white_list: Vec<PinSnapshot>,
        /// Blacklisted pins
        black_list: Vec<PinSnapshot>,
    },
}

impl ControllerReport {
    /// The controller this report came from
    pub fn controller(&self) -> ControllerId {
        match self {
            ControllerReport::LineTested { controller, .. } => *controller,
            ControllerReport::Completed { controller, .. } => *controller,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(Role::Initiator.to_string(), "initiator");
        assert_eq!(LineStatus::Failed.to_string(), "FAILED");
        assert_eq!(FailureReason::Disturbed.to_string(), "disturbed");
    }

    #[test]
    fn test_pin_snapshot_tested() {
        let mut pin = PinSnapshot {
            line: "L1".into(),
            syn: false,
            syn_ack: false,
            ack: false,
            role: None,
            false_responses: 0,
            blacklisted: false,
            successful: false,
            failure: None,
        };
        assert!(!pin.is_tested());
        pin.successful = true;
        assert!(pin.is_tested());
        pin.successful = false;
        pin.blacklisted = true;
        assert!(pin.is_tested());
    }
}
