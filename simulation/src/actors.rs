//! Auxiliary line actors
//!
//! Neither of these speaks the pairing protocol. The [`Pinger`] produces
//! pulses on one line (off-window widths disturb a listening controller,
//! and a latched pinger holds the line high outright). The [`Bridge`]
//! cross-wires a group of lines so activity on any one of them appears on
//! all the others.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use wirepair_core::{ControllerId, SharedLine};

/// Poll period for both actors
const ACTOR_POLL: Duration = Duration::from_micros(200);

/// Sleep in poll-sized steps; returns `false` if the stop signal fired
async fn pause(stop_rx: &watch::Receiver<bool>, duration: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + duration;
    while tokio::time::Instant::now() < deadline {
        if *stop_rx.borrow() {
            return false;
        }
        tokio::time::sleep(ACTOR_POLL).await;
    }
    true
}

/// Periodic pulse source on one line
pub struct Pinger {
    actor: ControllerId,
    line: Arc<dyn SharedLine>,
    interval: Duration,
    pulse_width: Duration,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Pinger {
    pub fn new(
        actor: ControllerId,
        line: Arc<dyn SharedLine>,
        interval: Duration,
        pulse_width: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            actor,
            line,
            interval,
            pulse_width,
            stop_tx,
            stop_rx,
            handle: None,
        }
    }

    /// A pinger that holds the line high until stopped
    pub fn latched(actor: ControllerId, line: Arc<dyn SharedLine>) -> Self {
        // One-hour pulses: effectively latched for any scenario run
        let hour = Duration::from_secs(3600);
        Self::new(actor, line, hour, hour)
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let actor = self.actor;
        let line = self.line.clone();
        let interval = self.interval;
        let pulse_width = self.pulse_width;
        let stop_rx = self.stop_rx.clone();

        self.handle = Some(tokio::spawn(async move {
            debug!(%actor, line = %line.name(), "pinger started");
            while !*stop_rx.borrow() {
                line.drive(actor);
                if !pause(&stop_rx, pulse_width).await {
                    break;
                }
                line.release(actor);
                if !pause(&stop_rx, interval.saturating_sub(pulse_width)).await {
                    break;
                }
            }
            line.release(actor);
            debug!(%actor, line = %line.name(), "pinger stopped");
        }));
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Cross-wires a group of lines
///
/// While any member the bridge is not itself driving reads high, the bridge
/// drives every other member; when no external activity remains, it
/// releases everything. Tracking its own drives keeps it from latching on
/// its own feedback.
pub struct Bridge {
    actor: ControllerId,
    lines: Vec<Arc<dyn SharedLine>>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Bridge {
    pub fn new(actor: ControllerId, lines: Vec<Arc<dyn SharedLine>>) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            actor,
            lines,
            stop_tx,
            stop_rx,
            handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let actor = self.actor;
        let lines = self.lines.clone();
        let stop_rx = self.stop_rx.clone();

        self.handle = Some(tokio::spawn(async move {
            debug!(%actor, lines = lines.len(), "bridge started");
            let mut driving = vec![false; lines.len()];

            while !*stop_rx.borrow() {
                let source_high: Vec<bool> = lines
                    .iter()
                    .enumerate()
                    .map(|(idx, line)| !driving[idx] && line.observe())
                    .collect();

                if source_high.iter().any(|&high| high) {
                    for (idx, line) in lines.iter().enumerate() {
                        if !source_high[idx] && !driving[idx] {
                            line.drive(actor);
                            driving[idx] = true;
                        }
                    }
                } else {
                    for (idx, line) in lines.iter().enumerate() {
                        if driving[idx] {
                            line.release(actor);
                            driving[idx] = false;
                        }
                    }
                }

                tokio::time::sleep(ACTOR_POLL).await;
            }

            for line in &lines {
                line.release(actor);
            }
            debug!(%actor, "bridge stopped");
        }));
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use wirepair_line::ReliableLine;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pinger_pulses_and_releases_on_stop() {
        let line: Arc<dyn SharedLine> = Arc::new(ReliableLine::new("L1"));
        let mut pinger = Pinger::new(
            ControllerId('P'),
            line.clone(),
            Duration::from_millis(20),
            Duration::from_millis(10),
        );
        pinger.start();

        // Catch at least one pulse
        let mut seen_high = false;
        for _ in 0..100 {
            if line.observe() {
                seen_high = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(seen_high, "pinger never drove the line");

        pinger.stop();
        pinger.join().await;
        assert!(!line.observe(), "line left asserted after pinger stopped");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_latched_pinger_holds_line_high() {
        let line: Arc<dyn SharedLine> = Arc::new(ReliableLine::new("L1"));
        let mut pinger = Pinger::latched(ControllerId('P'), line.clone());
        pinger.start();

        tokio::time::sleep(Duration::from_millis(20)).await;
        for _ in 0..20 {
            assert!(line.observe());
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        pinger.stop();
        pinger.join().await;
        assert!(!line.observe());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bridge_mirrors_and_unlatches() {
        let left: Arc<dyn SharedLine> = Arc::new(ReliableLine::new("left"));
        let right: Arc<dyn SharedLine> = Arc::new(ReliableLine::new("right"));
        let driver = ControllerId('A');

        let mut bridge = Bridge::new(ControllerId('X'), vec![left.clone(), right.clone()]);
        bridge.start();
        tokio::time::sleep(Duration::from_millis(10)).await;

        left.drive(driver);
        let mut mirrored = false;
        for _ in 0..100 {
            if right.observe() {
                mirrored = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(mirrored, "bridge never mirrored activity");

        left.release(driver);
        let mut released = false;
        for _ in 0..100 {
            if !right.observe() && !left.observe() {
                released = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(released, "bridge latched after the source released");

        bridge.stop();
        bridge.join().await;
    }
}
