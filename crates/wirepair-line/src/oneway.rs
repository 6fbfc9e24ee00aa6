//! A line only one actor can drive
//!
//! Models a broken or asymmetric wire: the designated sender's calls work
//! normally, everyone else's are silently ignored. Observation is unrestricted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::trace;

use wirepair_core::{ControllerId, LineName, SharedLine};

use crate::trace::{ActivityTrace, LineAction};

/// One-way shared line with a single permitted sender
#[derive(Debug)]
pub struct OneWayLine {
    name: LineName,
    sender: ControllerId,
    level: AtomicBool,
    trace: Option<Arc<ActivityTrace>>,
}

impl OneWayLine {
    pub fn new(name: impl Into<LineName>, sender: ControllerId) -> Self {
        Self::with_trace(name.into(), sender, None)
    }

    pub fn with_trace(name: LineName, sender: ControllerId, trace: Option<Arc<ActivityTrace>>) -> Self {
        Self {
            name,
            sender,
            level: AtomicBool::new(false),
            trace,
        }
    }

    /// The only actor whose drives take effect
    pub fn sender(&self) -> ControllerId {
        self.sender
    }
}

impl SharedLine for OneWayLine {
    fn name(&self) -> &LineName {
        &self.name
    }

    fn drive(&self, actor: ControllerId) {
        if actor != self.sender {
            trace!(line = %self.name, %actor, "drive ignored on one-way line");
            return;
        }
        if !self.level.swap(true, Ordering::SeqCst) {
            if let Some(trace) = &self.trace {
                trace.record(&self.name, actor, LineAction::Driven);
            }
        }
    }

    fn release(&self, actor: ControllerId) {
        if actor != self.sender {
            return;
        }
        if self.level.swap(false, Ordering::SeqCst) {
            if let Some(trace) = &self.trace {
                trace.record(&self.name, actor, LineAction::Released);
            }
        }
    }

    fn observe(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}
