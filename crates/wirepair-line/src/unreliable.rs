//! A line whose reads fail low at random
//!
//! The true driven state is the OR of the driver set, exactly like
//! [`ReliableLine`], but each `observe` call independently returns `false`
//! with the configured probability even while the line is truly asserted.
//! It never reports `true` while truly idle.
//!
//! [`ReliableLine`]: crate::reliable::ReliableLine

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use wirepair_core::{ControllerId, LineName, SharedLine};

use crate::trace::{ActivityTrace, LineAction};

/// Shared line with per-read dropout
#[derive(Debug)]
pub struct UnreliableLine {
    name: LineName,
    drivers: Mutex<BTreeSet<ControllerId>>,
    failure_rate: f64,
    trace: Option<Arc<ActivityTrace>>,
}

impl UnreliableLine {
    pub fn new(name: impl Into<LineName>, failure_rate: f64) -> Self {
        Self::with_trace(name.into(), failure_rate, None)
    }

    pub fn with_trace(
        name: LineName,
        failure_rate: f64,
        trace: Option<Arc<ActivityTrace>>,
    ) -> Self {
        Self {
            name,
            drivers: Mutex::new(BTreeSet::new()),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            trace,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

impl SharedLine for UnreliableLine {
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
        let truly_high = !self.drivers.lock().is_empty();
        if !truly_high {
            return false;
        }
        // False negatives only: a truly high line may read low
        if self.failure_rate > 0.0 && rand::rng().random_bool(self.failure_rate) {
            return false;
        }
        true
    }
}
