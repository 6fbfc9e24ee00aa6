//! The line monitor worker
//!
//! Polls every line visible to one controller at a sub-millisecond period,
//! detects edges, times the high-duration of each pulse, and classifies it
//! into a [`SignalKind`] via the controller's tolerance windows. Matched
//! pulses become [`DecodedSignal`] events on the engine's queue; everything
//! else is dropped. The monitor knows nothing about engine state and runs
//! until the controller-wide stop signal fires.
//!
//! [`SignalKind`]: wirepair_core::SignalKind

use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use wirepair_core::{Clock, ControllerId, DecodedSignal, LineSet, SignalTiming, SystemClock};

/// Edge-detecting pulse decoder for one controller's visible lines
pub struct LineMonitor<C: Clock = SystemClock> {
    id: ControllerId,
    lines: LineSet,
    timing: SignalTiming,
    clock: C,
    events_tx: mpsc::UnboundedSender<DecodedSignal>,
    stop_rx: watch::Receiver<bool>,
}

impl<C: Clock + 'static> LineMonitor<C> {
    pub fn new(
        id: ControllerId,
        lines: LineSet,
        timing: SignalTiming,
        clock: C,
        events_tx: mpsc::UnboundedSender<DecodedSignal>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            lines,
            timing,
            clock,
            events_tx,
            stop_rx,
        }
    }

    /// Spawn the monitor as a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the poll loop until the stop signal fires
    pub async fn run(self) {
        debug!(controller = %self.id, lines = self.lines.len(), "line monitor started");

        let mut previous = vec![false; self.lines.len()];
        let mut pulse_start: Vec<Option<Instant>> = vec![None; self.lines.len()];

        while !*self.stop_rx.borrow() {
            for (idx, line) in self.lines.iter().enumerate() {
                let level = line.observe();
                match (previous[idx], level) {
                    (false, true) => {
                        pulse_start[idx] = Some(self.clock.now());
                    }
                    (true, false) => {
                        if let Some(start) = pulse_start[idx].take() {
                            let measured = self.clock.now().saturating_duration_since(start);
                            match self.timing.classify(measured) {
                                Some(kind) => {
                                    trace!(
                                        controller = %self.id,
                                        line = %line.name(),
                                        %kind,
                                        measured_ms = measured.as_millis() as u64,
                                        "pulse decoded"
                                    );
                                    let _ = self.events_tx.send(DecodedSignal {
                                        line: line.name().clone(),
                                        kind,
                                        measured,
                                    });
                                }
                                None => {
                                    trace!(
                                        controller = %self.id,
                                        line = %line.name(),
                                        measured_ms = measured.as_millis() as u64,
                                        "pulse outside every window, dropped"
                                    );
                                }
                            }
                        }
                    }
                    _ => {}
                }
                previous[idx] = level;
            }
            self.clock.sleep(self.timing.monitor_poll).await;
        }

        debug!(controller = %self.id, "line monitor stopped");
    }
}
