//! A line that always reports its true driven state

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use wirepair_core::{ControllerId, LineName, SharedLine};

use crate::trace::{ActivityTrace, LineAction};

/// Reliable shared line: level equals "driver set non-empty"
#[derive(Debug)]
pub struct ReliableLine {
    name: LineName,
    drivers: Mutex<BTreeSet<ControllerId>>,
    trace: Option<Arc<ActivityTrace>>,
}

impl ReliableLine {
    pub fn new(name: impl Into<LineName>) -> Self {
        Self::with_trace(name.into(), None)
    }

    pub fn with_trace(name: LineName, trace: Option<Arc<ActivityTrace>>) -> Self {
        Self {
            name,
            drivers: Mutex::new(BTreeSet::new()),
            trace,
        }
    }
}

impl SharedLine for ReliableLine {
    fn name(&self) -> &LineName {
        &self.name
    }

    fn drive(&self, actor: ControllerId) {
        if self.drivers.lock().insert(actor) {
            if let Some(trace) = &self.trace {
                trace.record(&self.name, actor, LineAction::Driven);
            }
        }
    }

    fn release(&self, actor: ControllerId) {
        if self.drivers.lock().remove(&actor) {
            if let Some(trace) = &self.trace {
                trace.record(&self.name, actor, LineAction::Released);
            }
        }
    }

    fn observe(&self) -> bool {
        !self.drivers.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_tracks_driver_set() {
        let line = ReliableLine::new("L1");
        let a = ControllerId('A');
        let b = ControllerId('B');

        assert!(!line.observe());
        line.drive(a);
        assert!(line.observe());
        line.drive(b);
        line.release(a);
        // B still driving
        assert!(line.observe());
        line.release(b);
        assert!(!line.observe());
    }

    #[test]
    fn test_drive_release_idempotent() {
        let line = ReliableLine::new("L1");
        let a = ControllerId('A');

        line.drive(a);
        line.drive(a);
        line.release(a);
        assert!(!line.observe());

        line.release(a);
        assert!(!line.observe());
    }

    #[test]
    fn test_trace_records_transitions_once() {
        let trace = Arc::new(ActivityTrace::new());
        let line = ReliableLine::with_trace("L1".into(), Some(trace.clone()));
        let a = ControllerId('A');

        line.drive(a);
        line.drive(a);
        line.release(a);
        line.release(a);

        // Redundant calls do not produce entries
        assert_eq!(trace.len(), 2);
    }
}
