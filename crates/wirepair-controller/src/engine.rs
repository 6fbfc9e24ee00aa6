//! The negotiation engine
//!
//! One explicit state machine per controller. Each state has one transition
//! handler returning the next state; every wait inside a handler is a
//! polling loop with an explicit wall-clock deadline that re-checks the
//! stop signal and drains the decoded-event queue each tick.
//!
//! ## State Machine
//!
//! ```text
//!            .----------------- carrier sensed / collision ----------.
//!            v                                                       |
//! Init --(slot idle, clean SYN)--> Initiator --(SYN_ACK+ACK)--> Success
//!   ^                                  |                            |
//!   |                                  '---(deadline)---> Failed    |
//!   |  MaybeResponder --(SYN)--> Responder --(ACK)--> Success       |
//!   |        |                        '---(deadline)---> Failed     |
//!   '--(timeout: false response)                                    |
//!                                                                   v
//!                all lines tested -------------------> PassiveResponder
//! ```
//!
//! Arbitration has no priorities and no cross-controller locks: random line
//! choice, a random quantized contention slot, carrier-sense deference, and
//! collision abort are the whole mechanism.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::seq::IndexedRandom;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use wirepair_core::{
    Clock, ControllerId, ControllerReport, DecodedSignal, FailureReason, LineName, LineSet,
    LineStatus, Role, SharedLine, SignalKind, SignalTiming, SystemClock,
};

use crate::pin::PinRecord;

/// The engine's protocol states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Pick a line, idle through a contention slot, transmit SYN
    Init,
    /// Activity seen somewhere; wait for it to decode into a SYN
    MaybeResponder,
    /// Own SYN sent cleanly; wait for the answer
    Initiator,
    /// Peer SYN decoded; answer and wait for confirmation
    Responder,
    /// Handshake complete on the current line
    Success,
    /// The current line did not hold up
    Failed,
    /// Every line tested; keep answering a late peer for a grace period
    PassiveResponder,
}

/// Decoded signals the engine has drained but not yet acted on
///
/// At most one pending line per signal kind; a newer event of the same kind
/// replaces the older one (the protocol never has two live signals of one
/// kind that both matter).
#[derive(Debug, Default)]
struct SignalInbox {
    syn: Option<LineName>,
    syn_ack: Option<LineName>,
    ack: Option<LineName>,
}

impl SignalInbox {
    fn clear(&mut self) {
        self.syn = None;
        self.syn_ack = None;
        self.ack = None;
    }
}

/// How a transmission ended
enum Transmit {
    Completed,
    Conflict(LineName),
    Stopped,
}

/// The per-controller handshake state machine
pub struct NegotiationEngine<C: Clock = SystemClock> {
    id: ControllerId,
    lines: LineSet,
    timing: SignalTiming,
    clock: C,
    pins: Arc<DashMap<LineName, PinRecord>>,
    events_rx: mpsc::UnboundedReceiver<DecodedSignal>,
    reports_tx: mpsc::UnboundedSender<ControllerReport>,
    stop_rx: watch::Receiver<bool>,
    /// The one line currently under negotiation
    current: Option<LineName>,
    /// Role taken in the active negotiation
    role: Option<Role>,
    inbox: SignalInbox,
    /// Per-line instant of our own last release, for echo suppression.
    /// Survives state resets: our own trailing pulse may decode afterwards.
    last_sent: HashMap<LineName, Instant>,
    /// Reason to record when the next transition lands in Failed
    pending_failure: Option<FailureReason>,
}

impl<C: Clock + 'static> NegotiationEngine<C> {
    #[allow(clippy::too_many_arguments)] // Constructor wiring both channels and shared state
    pub fn new(
        id: ControllerId,
        lines: LineSet,
        timing: SignalTiming,
        clock: C,
        pins: Arc<DashMap<LineName, PinRecord>>,
        events_rx: mpsc::UnboundedReceiver<DecodedSignal>,
        reports_tx: mpsc::UnboundedSender<ControllerReport>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            lines,
            timing,
            clock,
            pins,
            events_rx,
            reports_tx,
            stop_rx,
            current: None,
            role: None,
            inbox: SignalInbox::default(),
            last_sent: HashMap::new(),
            pending_failure: None,
        }
    }

    /// Spawn the engine as a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the state machine until every line is tested (plus the passive
    /// grace period) or the stop signal fires
    pub async fn run(mut self) {
        info!(controller = %self.id, lines = self.lines.len(), "negotiation engine started");

        let mut state = EngineState::Init;
        while !self.stopped() {
            let next = match state {
                EngineState::Init => self.on_init().await,
                EngineState::MaybeResponder => self.on_maybe_responder().await,
                EngineState::Initiator => self.on_initiator().await,
                EngineState::Responder => self.on_responder().await,
                EngineState::Success => self.on_success(),
                EngineState::Failed => self.on_failed(),
                EngineState::PassiveResponder => match self.on_passive_responder().await {
                    Some(next) => next,
                    None => break,
                },
            };
            if next != state {
                debug!(controller = %self.id, from = ?state, to = ?next, "state transition");
            }
            state = next;
        }

        if self.all_tested() {
            self.emit_completed();
        }
        info!(controller = %self.id, "negotiation engine stopped");
    }

    // ------------------------------------------------------------------
    // State handlers
    // ------------------------------------------------------------------

    async fn on_init(&mut self) -> EngineState {
        let untested = self.untested_lines();
        let Some(candidate) = untested.choose(&mut rand::rng()).cloned() else {
            return EngineState::PassiveResponder;
        };
        self.current = Some(candidate.clone());

        let slot = self.timing.draw_slot();
        debug!(
            controller = %self.id,
            line = %candidate,
            slot_ms = slot.as_millis() as u64,
            "contention slot drawn"
        );

        let deadline = self.clock.now() + slot;
        while self.clock.now() < deadline {
            if self.stopped() {
                return EngineState::Init;
            }
            self.drain_events();
            if let Some(active) = self.first_active_line(true) {
                debug!(controller = %self.id, line = %active, "carrier sensed during slot, deferring");
                self.current = Some(active);
                return EngineState::MaybeResponder;
            }
            self.clock.sleep(self.timing.engine_poll).await;
        }

        // Last look before claiming the bus
        if let Some(active) = self.first_active_line(true) {
            debug!(controller = %self.id, line = %active, "carrier sensed at slot end, deferring");
            self.current = Some(active);
            return EngineState::MaybeResponder;
        }

        let Some(line) = self.lines.get(&candidate).cloned() else {
            return EngineState::Init;
        };
        self.with_pin(&candidate, |pin| {
            pin.mark_syn();
            pin.set_role(Role::Initiator);
        });
        match self.transmit(line, SignalKind::Syn, true).await {
            Transmit::Completed => {
                self.role = Some(Role::Initiator);
                EngineState::Initiator
            }
            Transmit::Conflict(other) => {
                debug!(controller = %self.id, line = %other, "collision during SYN, yielding");
                self.current = Some(other);
                EngineState::MaybeResponder
            }
            Transmit::Stopped => EngineState::Init,
        }
    }

    async fn on_maybe_responder(&mut self) -> EngineState {
        let Some(current) = self.current.clone() else {
            return EngineState::Init;
        };
        let line = self.lines.get(&current).cloned();
        debug!(controller = %self.id, line = %current, "waiting for SYN");

        let mut deadline = self.clock.now() + self.timing.responder_timeout;
        let mut extended = false;
        loop {
            if self.stopped() {
                return EngineState::MaybeResponder;
            }
            self.drain_events();

            if let Some(syn_line) = self.inbox.syn.take() {
                debug!(controller = %self.id, line = %syn_line, "SYN received, responding");
                self.current = Some(syn_line.clone());
                self.role = Some(Role::Responder);
                self.with_pin(&syn_line, |pin| {
                    pin.mark_syn();
                    pin.set_role(Role::Responder);
                });
                return EngineState::Responder;
            }

            if self.clock.now() >= deadline {
                debug!(controller = %self.id, line = %current, "no SYN before deadline, false response");
                let ceiling = self.timing.max_false_responses;
                let disturbed = self
                    .with_pin(&current, |pin| pin.record_false_response(ceiling))
                    .unwrap_or(false);
                if disturbed {
                    warn!(controller = %self.id, line = %current, "false-response ceiling reached, line disturbed");
                    self.emit_line_tested(&current, LineStatus::Failed);
                }
                self.reset_transient();
                return EngineState::Init;
            }

            // A pulse still in flight may be the SYN we are waiting for;
            // give the decoder one full SYN window to finish it.
            if !extended && line.as_ref().is_some_and(|l| l.observe()) {
                deadline = deadline.max(self.clock.now() + self.timing.syn + self.timing.tolerance);
                extended = true;
            }

            self.clock.sleep(self.timing.engine_poll).await;
        }
    }

    async fn on_initiator(&mut self) -> EngineState {
        let Some(current) = self.current.clone() else {
            return EngineState::Init;
        };
        let Some(line) = self.lines.get(&current).cloned() else {
            return EngineState::Init;
        };
        debug!(controller = %self.id, line = %current, "waiting for SYN_ACK");

        let mut deadline = self.clock.now() + self.timing.syn_ack_timeout;
        let mut extended = false;
        loop {
            if self.stopped() {
                return EngineState::Initiator;
            }
            self.drain_events();

            if let Some(other) = self.other_active_line(&current) {
                debug!(controller = %self.id, line = %other, "another line went active, deferring");
                self.current = Some(other);
                return EngineState::MaybeResponder;
            }

            if self.inbox.syn_ack.take_if(|l| *l == current).is_some() {
                debug!(controller = %self.id, line = %current, "SYN_ACK received");
                self.with_pin(&current, |pin| pin.mark_syn_ack());
                if !self.idle(self.timing.settle).await {
                    return EngineState::Initiator;
                }
                return match self.transmit(line, SignalKind::Ack, false).await {
                    Transmit::Completed => {
                        self.with_pin(&current, |pin| pin.mark_ack());
                        EngineState::Success
                    }
                    Transmit::Stopped | Transmit::Conflict(_) => EngineState::Initiator,
                };
            }

            if self.clock.now() >= deadline {
                debug!(controller = %self.id, line = %current, "SYN_ACK deadline passed");
                self.pending_failure = Some(FailureReason::Timeout);
                return EngineState::Failed;
            }

            if !extended && line.observe() {
                deadline =
                    deadline.max(self.clock.now() + self.timing.syn_ack + self.timing.tolerance);
                extended = true;
            }

            self.clock.sleep(self.timing.engine_poll).await;
        }
    }

    async fn on_responder(&mut self) -> EngineState {
        let Some(current) = self.current.clone() else {
            return EngineState::Init;
        };
        let Some(line) = self.lines.get(&current).cloned() else {
            return EngineState::Init;
        };

        match self.transmit(line.clone(), SignalKind::SynAck, false).await {
            Transmit::Completed => {}
            Transmit::Stopped | Transmit::Conflict(_) => return EngineState::Responder,
        }
        self.with_pin(&current, |pin| pin.mark_syn_ack());

        if !self.idle(self.timing.settle).await {
            return EngineState::Responder;
        }

        debug!(controller = %self.id, line = %current, "waiting for ACK");
        let mut deadline = self.clock.now() + self.timing.ack_timeout;
        let mut extended = false;
        loop {
            if self.stopped() {
                return EngineState::Responder;
            }
            self.drain_events();

            if self.inbox.ack.take_if(|l| *l == current).is_some() {
                debug!(controller = %self.id, line = %current, "ACK received");
                self.with_pin(&current, |pin| pin.mark_ack());
                return EngineState::Success;
            }

            if self.clock.now() >= deadline {
                debug!(controller = %self.id, line = %current, "ACK deadline passed");
                self.pending_failure = Some(FailureReason::Timeout);
                return EngineState::Failed;
            }

            if !extended && line.observe() {
                deadline = deadline.max(self.clock.now() + self.timing.ack + self.timing.tolerance);
                extended = true;
            }

            self.clock.sleep(self.timing.engine_poll).await;
        }
    }

    fn on_success(&mut self) -> EngineState {
        if let Some(current) = self.current.clone() {
            let role = self.role;
            self.with_pin(&current, |pin| {
                if let Some(role) = role {
                    pin.set_role(role);
                }
                pin.mark_successful();
            });
            info!(controller = %self.id, line = %current, role = ?self.role, "line paired");
            self.emit_line_tested(&current, LineStatus::Working);
        }
        self.reset_transient();
        if self.all_tested() {
            EngineState::PassiveResponder
        } else {
            EngineState::Init
        }
    }

    fn on_failed(&mut self) -> EngineState {
        if let Some(current) = self.current.clone() {
            let reason = self.pending_failure.take().unwrap_or(FailureReason::Blacklisted);
            self.with_pin(&current, |pin| pin.mark_failed(reason));
            warn!(controller = %self.id, line = %current, %reason, "line failed");
            self.emit_line_tested(&current, LineStatus::Failed);
        }
        self.reset_transient();
        if self.all_tested() {
            EngineState::PassiveResponder
        } else {
            EngineState::Init
        }
    }

    /// Returns `None` when the grace period expired and the engine is done
    async fn on_passive_responder(&mut self) -> Option<EngineState> {
        debug!(controller = %self.id, "all lines tested, passive grace period");

        let deadline = self.clock.now() + self.timing.grace_period;
        while self.clock.now() < deadline {
            if self.stopped() {
                return None;
            }
            self.drain_events();

            if let Some(syn_line) = self.inbox.syn.take() {
                debug!(controller = %self.id, line = %syn_line, "late SYN, answering");
                self.current = Some(syn_line.clone());
                self.role = Some(Role::Responder);
                self.with_pin(&syn_line, |pin| {
                    pin.mark_syn();
                    pin.set_role(Role::Responder);
                });
                return Some(EngineState::Responder);
            }

            // A late peer deserves an answer even on a line we blacklisted
            if let Some(active) = self.first_active_line(false) {
                debug!(controller = %self.id, line = %active, "late activity, observing");
                self.current = Some(active);
                return Some(EngineState::MaybeResponder);
            }

            self.clock.sleep(self.timing.engine_poll).await;
        }
        None
    }

    // ------------------------------------------------------------------
    // Shared machinery
    // ------------------------------------------------------------------

    fn stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Drain the monitor queue fully, suppressing our own echoes
    fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            if self.is_own_echo(&event) {
                trace!(controller = %self.id, line = %event.line, kind = %event.kind, "own echo suppressed");
                continue;
            }
            debug!(
                controller = %self.id,
                line = %event.line,
                kind = %event.kind,
                measured_ms = event.measured.as_millis() as u64,
                "signal received"
            );
            match event.kind {
                SignalKind::Syn => self.inbox.syn = Some(event.line),
                SignalKind::SynAck => self.inbox.syn_ack = Some(event.line),
                SignalKind::Ack => self.inbox.ack = Some(event.line),
            }
        }
    }

    fn is_own_echo(&self, event: &DecodedSignal) -> bool {
        self.last_sent.get(&event.line).is_some_and(|sent| {
            self.clock.now().saturating_duration_since(*sent) < self.timing.echo_window
        })
    }

    /// Hold the current line high for the signal's nominal duration
    ///
    /// Always releases, including on stop. With `watch_conflicts`, a
    /// different non-blacklisted line going active aborts the transmission;
    /// the same line still being high after our own release means someone
    /// was transmitting on top of us, which also counts as a conflict. In
    /// that case the echo-suppression record is deliberately not written, so
    /// the merged pulse decodes as the peer's signal. At most one of two
    /// overlapping transmitters can see the overlap (the last one to release
    /// always finds the line low), so exactly one side yields.
    async fn transmit(
        &mut self,
        line: Arc<dyn SharedLine>,
        kind: SignalKind,
        watch_conflicts: bool,
    ) -> Transmit {
        debug!(controller = %self.id, line = %line.name(), %kind, "transmitting");
        line.drive(self.id);

        let deadline = self.clock.now() + self.timing.nominal(kind);
        let outcome = loop {
            if self.stopped() {
                break Transmit::Stopped;
            }
            if self.clock.now() >= deadline {
                break Transmit::Completed;
            }
            if watch_conflicts {
                if let Some(other) = self.other_active_line(line.name()) {
                    break Transmit::Conflict(other);
                }
            }
            self.clock.sleep(self.timing.engine_poll).await;
        };

        line.release(self.id);
        if matches!(outcome, Transmit::Completed) && watch_conflicts && line.observe() {
            debug!(controller = %self.id, line = %line.name(), "release overlap, peer transmitting");
            return Transmit::Conflict(line.name().clone());
        }
        self.last_sent.insert(line.name().clone(), self.clock.now());
        outcome
    }

    /// Stop-aware idle; returns `false` if the stop signal cut it short
    async fn idle(&self, duration: Duration) -> bool {
        let deadline = self.clock.now() + duration;
        while self.clock.now() < deadline {
            if self.stopped() {
                return false;
            }
            self.clock.sleep(self.timing.engine_poll).await;
        }
        true
    }

    /// First line currently observed high, in configuration order
    fn first_active_line(&self, skip_blacklisted: bool) -> Option<LineName> {
        self.lines
            .iter()
            .find(|line| {
                line.observe() && !(skip_blacklisted && self.is_blacklisted(line.name()))
            })
            .map(|line| line.name().clone())
    }

    /// First non-blacklisted line other than `current` observed high
    fn other_active_line(&self, current: &LineName) -> Option<LineName> {
        self.lines
            .iter()
            .find(|line| {
                line.name() != current && line.observe() && !self.is_blacklisted(line.name())
            })
            .map(|line| line.name().clone())
    }

    fn with_pin<R>(&self, name: &LineName, f: impl FnOnce(&mut PinRecord) -> R) -> Option<R> {
        self.pins.get_mut(name).map(|mut pin| f(&mut pin))
    }

    fn is_blacklisted(&self, name: &LineName) -> bool {
        self.pins.get(name).is_some_and(|pin| pin.is_blacklisted())
    }

    fn all_tested(&self) -> bool {
        self.pins.iter().all(|pin| pin.is_tested())
    }

    fn untested_lines(&self) -> Vec<LineName> {
        self.lines
            .names()
            .into_iter()
            .filter(|name| !self.pins.get(name).is_some_and(|pin| pin.is_tested()))
            .collect()
    }

    fn reset_transient(&mut self) {
        self.current = None;
        self.role = None;
        self.inbox.clear();
        self.pending_failure = None;
    }

    fn emit_line_tested(&self, line: &LineName, status: LineStatus) {
        let _ = self.reports_tx.send(ControllerReport::LineTested {
            controller: self.id,
            line: line.clone(),
            status,
            role: self.role,
            timestamp: self.clock.now_utc(),
        });
    }

    fn emit_completed(&self) {
        let mut white_list = Vec::new();
        let mut black_list = Vec::new();
        for name in self.lines.names() {
            if let Some(pin) = self.pins.get(&name) {
                let snapshot = pin.snapshot();
                if snapshot.blacklisted {
                    black_list.push(snapshot);
                } else if snapshot.successful {
                    white_list.push(snapshot);
                }
            }
        }
        info!(
            controller = %self.id,
            white = white_list.len(),
            black = black_list.len(),
            "all lines tested"
        );
        let _ = self.reports_tx.send(ControllerReport::Completed {
            controller: self.id,
            timestamp: self.clock.now_utc(),
            white_list,
            black_list,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    use wirepair_core::LineSet;
    use wirepair_line::ReliableLine;

    use crate::controller::Controller;

    use super::*;

    /// Wait until `predicate` holds on the line level, polling every 2ms
    async fn wait_for_level(
        line: &Arc<ReliableLine>,
        level: bool,
        deadline: Duration,
    ) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if line.observe() == level {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        false
    }

    /// Drive a full handshake against a running controller by hand: the
    /// test acts as the initiating peer, the controller must answer as
    /// responder.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_engine_responds_to_scripted_initiator() {
        let timing = SignalTiming::accelerated();
        let line = Arc::new(ReliableLine::new("L1"));
        let peer = ControllerId('P');

        // Claim the bus before the controller even starts, so its engine
        // defers into MaybeResponder instead of contending.
        line.drive(peer);

        let visible: Arc<dyn SharedLine> = line.clone();
        let mut controller = Controller::new(
            ControllerId('B'),
            LineSet::new(vec![visible]),
            timing.clone(),
        );
        let mut reports = controller.take_reports().unwrap();
        controller.start().unwrap();

        // Finish the SYN pulse
        tokio::time::sleep(timing.syn).await;
        line.release(peer);

        // The controller must answer with a SYN_ACK-length pulse
        assert!(
            wait_for_level(&line, true, Duration::from_secs(2)).await,
            "responder never asserted SYN_ACK"
        );
        assert!(
            wait_for_level(&line, false, timing.syn_ack + Duration::from_secs(1)).await,
            "responder never released SYN_ACK"
        );

        // Confirm with an ACK
        tokio::time::sleep(timing.settle).await;
        line.drive(peer);
        tokio::time::sleep(timing.ack).await;
        line.release(peer);

        let report = timeout(Duration::from_secs(3), reports.recv())
            .await
            .expect("no report before timeout")
            .expect("report channel closed");
        match report {
            ControllerReport::LineTested {
                status,
                role,
                line: line_name,
                ..
            } => {
                assert_eq!(line_name, LineName::from("L1"));
                assert_eq!(status, LineStatus::Working);
                assert_eq!(role, Some(Role::Responder));
            }
            other => panic!("unexpected report: {other:?}"),
        }

        let pin = controller.pin(&"L1".into()).unwrap();
        assert!(pin.successful);
        assert!(pin.syn && pin.syn_ack && pin.ack);

        controller.stop();
        controller.join().await.unwrap();
        assert!(!line.observe(), "line left asserted after join");
    }

    /// A controller alone on a line must not pair with its own echo
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lone_controller_never_pairs_with_itself() {
        let timing = SignalTiming::accelerated();
        let line = Arc::new(ReliableLine::new("L1"));

        let visible: Arc<dyn SharedLine> = line.clone();
        let mut controller = Controller::new(
            ControllerId('A'),
            LineSet::new(vec![visible]),
            timing.clone(),
        );
        let mut reports = controller.take_reports().unwrap();
        controller.start().unwrap();

        let report = timeout(Duration::from_secs(10), reports.recv())
            .await
            .expect("no report before timeout")
            .expect("report channel closed");
        match report {
            ControllerReport::LineTested { status, role, .. } => {
                assert_eq!(status, LineStatus::Failed);
                assert_ne!(role, Some(Role::Responder));
            }
            other => panic!("unexpected report: {other:?}"),
        }

        let pin = controller.pin(&"L1".into()).unwrap();
        assert!(pin.blacklisted);
        assert!(!pin.successful);
        assert_eq!(pin.failure, Some(FailureReason::Timeout));

        controller.stop();
        controller.join().await.unwrap();
    }
}
