//! # Wirepair Line
//!
//! The three [`SharedLine`] implementations controllers contend over:
//!
//! - [`ReliableLine`]: level is exactly "driver set non-empty"
//! - [`OneWayLine`]: only one designated sender can drive it (models a
//!   broken or asymmetric wire)
//! - [`UnreliableLine`]: each read independently fails low with a
//!   configured probability (false negatives only, never false positives)
//!
//! Plus the [`ActivityTrace`] diagnostics recorder and the [`LineKind`]
//! descriptor + [`build_line`] factory used by scenario wiring.

pub mod oneway;
pub mod reliable;
pub mod trace;
pub mod unreliable;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use wirepair_core::{ControllerId, LineName, SharedLine};

pub use oneway::OneWayLine;
pub use reliable::ReliableLine;
pub use trace::{ActivityTrace, LineAction, TraceEntry};
pub use unreliable::UnreliableLine;

/// Declarative description of one line, used by scenario configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LineKind {
    /// Level always equals "driver set non-empty"
    Reliable,
    /// Only `sender` can drive the line
    OneWay { sender: ControllerId },
    /// Reads fail low independently with probability `failure_rate`
    Unreliable { failure_rate: f64 },
}

/// Build a line from its descriptor
pub fn build_line(
    name: LineName,
    kind: &LineKind,
    trace: Option<Arc<ActivityTrace>>,
) -> Arc<dyn SharedLine> {
    match kind {
        LineKind::Reliable => Arc::new(ReliableLine::with_trace(name, trace)),
        LineKind::OneWay { sender } => Arc::new(OneWayLine::with_trace(name, *sender, trace)),
        LineKind::Unreliable { failure_rate } => {
            Arc::new(UnreliableLine::with_trace(name, *failure_rate, trace))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_each_kind() {
        let a = ControllerId('A');
        let reliable = build_line("L1".into(), &LineKind::Reliable, None);
        let oneway = build_line("L2".into(), &LineKind::OneWay { sender: a }, None);
        let unreliable = build_line(
            "L3".into(),
            &LineKind::Unreliable { failure_rate: 0.0 },
            None,
        );

        for line in [&reliable, &oneway, &unreliable] {
            assert!(!line.observe());
        }
        assert_eq!(reliable.name().as_str(), "L1");
        assert_eq!(oneway.name().as_str(), "L2");
        assert_eq!(unreliable.name().as_str(), "L3");
    }
}
