//! Per-line outcome records
//!
//! One [`PinRecord`] exists per (controller, line) pair for the lifetime of
//! the controller. Only that controller's engine mutates it; everyone else
//! reads [`PinSnapshot`] copies.
//!
//! Invariants:
//! - `is_tested() == successful || blacklisted`, and once true it never
//!   reverts (records are finalized, never cleared).
//! - Crossing the false-response ceiling permanently blacklists the pin as
//!   disturbed, even absent an explicit failure, and even if a later
//!   handshake on the line succeeds.

use wirepair_core::{FailureReason, LineName, PinSnapshot, Role};

/// Mutable per-line record owned by one controller's engine
#[derive(Debug, Clone)]
pub struct PinRecord {
    line: LineName,
    syn: bool,
    syn_ack: bool,
    ack: bool,
    role: Option<Role>,
    false_responses: u32,
    blacklisted: bool,
    successful: bool,
    failure: Option<FailureReason>,
}

impl PinRecord {
    pub fn new(line: LineName) -> Self {
        Self {
            line,
            syn: false,
            syn_ack: false,
            ack: false,
            role: None,
            false_responses: 0,
            blacklisted: false,
            successful: false,
            failure: None,
        }
    }

    pub fn line(&self) -> &LineName {
        &self.line
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Record that a SYN was seen or sent on this line
    pub fn mark_syn(&mut self) {
        self.syn = true;
    }

    /// Record that a SYN_ACK was seen or sent on this line
    pub fn mark_syn_ack(&mut self) {
        self.syn_ack = true;
    }

    /// Record that an ACK was seen or sent on this line
    pub fn mark_ack(&mut self) {
        self.ack = true;
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = Some(role);
    }

    /// Finalize a successful handshake
    ///
    /// Does not clear `blacklisted`: a disturbed line stays excluded even if
    /// a late handshake on it happens to work.
    pub fn mark_successful(&mut self) {
        self.successful = true;
    }

    /// Blacklist the pin; the first recorded reason wins
    pub fn mark_failed(&mut self, reason: FailureReason) {
        self.blacklisted = true;
        if self.failure.is_none() {
            self.failure = Some(reason);
        }
    }

    /// Count one MAYBE_RESPONDER timeout against this pin
    ///
    /// Returns `true` when this call crossed the ceiling and the pin just
    /// became disturbed.
    pub fn record_false_response(&mut self, ceiling: u32) -> bool {
        self.false_responses += 1;
        if self.false_responses >= ceiling && !self.blacklisted {
            self.blacklisted = true;
            self.failure = Some(FailureReason::Disturbed);
            return true;
        }
        false
    }

    pub fn false_responses(&self) -> u32 {
        self.false_responses
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    /// A pin is tested once it has either paired or been blacklisted
    pub fn is_tested(&self) -> bool {
        self.successful || self.blacklisted
    }

    pub fn failure(&self) -> Option<FailureReason> {
        self.failure
    }

    /// Read-only copy for collaborators
    pub fn snapshot(&self) -> PinSnapshot {
        PinSnapshot {
            line: self.line.clone(),
            syn: self.syn,
            syn_ack: self.syn_ack,
            ack: self.ack,
            role: self.role,
            false_responses: self.false_responses,
            blacklisted: self.blacklisted,
            successful: self.successful,
            failure: self.failure,
        }
    }
}
