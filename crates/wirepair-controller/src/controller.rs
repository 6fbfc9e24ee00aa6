//! Controller lifecycle and external surface
//!
//! A [`Controller`] owns one [`LineMonitor`] and one [`NegotiationEngine`]
//! over a shared [`LineSet`], wired together with the monitor→engine event
//! channel, a watch-based stop signal both workers observe within one poll
//! tick, and the outbound report channel collaborators consume.
//!
//! [`LineMonitor`]: crate::monitor::LineMonitor
//! [`NegotiationEngine`]: crate::engine::NegotiationEngine

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use wirepair_core::{
    Clock, ControllerId, ControllerReport, LineName, LineSet, PinSnapshot, SignalTiming,
    SystemClock,
};

use crate::engine::NegotiationEngine;
use crate::error::ControllerError;
use crate::monitor::LineMonitor;
use crate::pin::PinRecord;

/// One controller: identity, visible lines, pin records, and two workers
pub struct Controller<C: Clock = SystemClock> {
    id: ControllerId,
    lines: LineSet,
    timing: SignalTiming,
    clock: C,
    pins: Arc<DashMap<LineName, PinRecord>>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    reports_tx: mpsc::UnboundedSender<ControllerReport>,
    reports_rx: Option<mpsc::UnboundedReceiver<ControllerReport>>,
    workers: Option<(JoinHandle<()>, JoinHandle<()>)>,
}

impl Controller<SystemClock> {
    /// Create a controller on the system clock
    pub fn new(id: ControllerId, lines: LineSet, timing: SignalTiming) -> Self {
        Self::with_clock(id, lines, timing, SystemClock)
    }
}

impl<C: Clock + Clone + 'static> Controller<C> {
    /// Create a controller with an explicit clock
    pub fn with_clock(id: ControllerId, lines: LineSet, timing: SignalTiming, clock: C) -> Self {
        let pins = Arc::new(DashMap::new());
        for name in lines.names() {
            pins.insert(name.clone(), PinRecord::new(name));
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        Self {
            id,
            lines,
            timing,
            clock,
            pins,
            stop_tx,
            stop_rx,
            reports_tx,
            reports_rx: Some(reports_rx),
            workers: None,
        }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    /// Take the outbound report channel (once)
    pub fn take_reports(&mut self) -> Option<mpsc::UnboundedReceiver<ControllerReport>> {
        self.reports_rx.take()
    }

    /// Spawn both workers
    ///
    /// Validates the timing configuration first; starting twice is an error.
    pub fn start(&mut self) -> Result<(), ControllerError> {
        if self.workers.is_some() {
            return Err(ControllerError::AlreadyStarted(self.id));
        }
        if self.lines.is_empty() {
            return Err(ControllerError::NoLines(self.id));
        }
        self.timing.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let monitor = LineMonitor::new(
            self.id,
            self.lines.clone(),
            self.timing.clone(),
            self.clock.clone(),
            events_tx,
            self.stop_rx.clone(),
        );
        let engine = NegotiationEngine::new(
            self.id,
            self.lines.clone(),
            self.timing.clone(),
            self.clock.clone(),
            Arc::clone(&self.pins),
            events_rx,
            self.reports_tx.clone(),
            self.stop_rx.clone(),
        );
        self.workers = Some((monitor.spawn(), engine.spawn()));
        debug!(controller = %self.id, "controller started");
        Ok(())
    }

    /// Signal both workers to stop (idempotent)
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for both workers to exit
    pub async fn join(&mut self) -> Result<(), ControllerError> {
        if let Some((monitor, engine)) = self.workers.take() {
            monitor.await?;
            engine.await?;
            debug!(controller = %self.id, "controller joined");
        }
        Ok(())
    }

    /// Snapshot of one pin record
    pub fn pin(&self, line: &LineName) -> Option<PinSnapshot> {
        self.pins.get(line).map(|pin| pin.snapshot())
    }

    /// Snapshots of every pin, in configuration order
    pub fn pins(&self) -> Vec<PinSnapshot> {
        self.lines
            .names()
            .iter()
            .filter_map(|name| self.pin(name))
            .collect()
    }

    /// Whether every visible line is tested
    pub fn is_complete(&self) -> bool {
        self.pins().iter().all(|pin| pin.is_tested())
    }

    /// Names of successful, non-blacklisted lines
    pub fn white_list(&self) -> Vec<LineName> {
        self.pins()
            .into_iter()
            .filter(|pin| pin.successful && !pin.blacklisted)
            .map(|pin| pin.line)
            .collect()
    }

    /// Names of blacklisted lines
    pub fn black_list(&self) -> Vec<LineName> {
        self.pins()
            .into_iter()
            .filter(|pin| pin.blacklisted)
            .map(|pin| pin.line)
            .collect()
    }
}
