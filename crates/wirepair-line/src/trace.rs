//! Line activity diagnostics
//!
//! An append-only record of every drive/release transition across a
//! scenario, timestamped relative to trace creation. Observability only:
//! nothing in the protocol reads it back.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use wirepair_core::{ControllerId, LineName};

/// What an actor did to a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    Driven,
    Released,
}

/// One recorded transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Offset from trace creation
    pub offset: Duration,
    pub line: LineName,
    pub actor: ControllerId,
    pub action: LineAction,
}

/// Shared append-only activity recorder
///
/// One trace is typically shared by every line in a scenario so the
/// combined timeline can be dumped after a run.
#[derive(Debug)]
pub struct ActivityTrace {
    start: Instant,
    entries: Mutex<Vec<TraceEntry>>,
}

impl ActivityTrace {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record one transition
    pub fn record(&self, line: &LineName, actor: ControllerId, action: LineAction) {
        self.entries.lock().push(TraceEntry {
            offset: self.start.elapsed(),
            line: line.clone(),
            actor,
            action,
        });
    }

    /// Snapshot of all entries in record order
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Human-readable per-line timeline
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let entries = self.entries();
        let mut lines: Vec<LineName> = entries.iter().map(|e| e.line.clone()).collect();
        lines.sort();
        lines.dedup();

        let mut out = String::new();
        for line in lines {
            let _ = writeln!(out, "{line}:");
            for entry in entries.iter().filter(|e| e.line == line) {
                let verb = match entry.action {
                    LineAction::Driven => "driven",
                    LineAction::Released => "released",
                };
                let _ = writeln!(
                    out,
                    "  {:>8.1}ms  {} by {}",
                    entry.offset.as_secs_f64() * 1000.0,
                    verb,
                    entry.actor
                );
            }
        }
        out
    }
}

impl Default for ActivityTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let trace = ActivityTrace::new();
        let line: LineName = "L1".into();
        let a = ControllerId('A');

        trace.record(&line, a, LineAction::Driven);
        trace.record(&line, a, LineAction::Released);

        let entries = trace.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, LineAction::Driven);
        assert_eq!(entries[1].action, LineAction::Released);
        assert!(entries[0].offset <= entries[1].offset);
    }

    #[test]
    fn test_summary_groups_by_line() {
        let trace = ActivityTrace::new();
        trace.record(&"L2".into(), ControllerId('B'), LineAction::Driven);
        trace.record(&"L1".into(), ControllerId('A'), LineAction::Driven);

        let summary = trace.summary();
        let l1_pos = summary.find("L1:").unwrap();
        let l2_pos = summary.find("L2:").unwrap();
        assert!(l1_pos < l2_pos);
        assert!(summary.contains("driven by A"));
    }
}
