//! Pre-built simulation scenarios
//!
//! Each scenario wires a small topology, runs it to completion (or a cap),
//! and returns the collected outcome. The CLI prints the summary.

use std::time::Duration;

use tracing::info;

use wirepair_core::{ControllerId, SignalTiming};
use wirepair_line::LineKind;

use crate::actors::{Bridge, Pinger};
use crate::harness::{ScenarioBuilder, ScenarioError, ScenarioOutcome};

/// Knobs shared by every scenario
#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    pub timing: SignalTiming,
    /// Upper bound on scenario runtime
    pub max_duration: Duration,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            timing: SignalTiming::accelerated(),
            max_duration: Duration::from_secs(60),
        }
    }
}

/// Two controllers negotiating roles over a set of shared reliable lines
pub async fn run_pairing(
    line_count: usize,
    opts: &ScenarioOptions,
) -> Result<ScenarioOutcome, ScenarioError> {
    info!(line_count, "pairing scenario");

    let mut builder = ScenarioBuilder::new().timing(opts.timing.clone());
    let mut names = Vec::new();
    for idx in 1..=line_count.max(1) {
        let name = format!("L{idx}");
        builder = builder.line(name.clone(), LineKind::Reliable);
        names.push(name);
    }
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    builder
        .controller(ControllerId('A'), &name_refs)
        .controller(ControllerId('B'), &name_refs)
        .build()?
        .run_until_complete(opts.max_duration)
        .await
}

/// Two controllers over one line that drops every read
pub async fn run_unreliable(
    failure_rate: f64,
    opts: &ScenarioOptions,
) -> Result<ScenarioOutcome, ScenarioError> {
    info!(failure_rate, "unreliable-line scenario");

    ScenarioBuilder::new()
        .timing(opts.timing.clone())
        .line("L1", LineKind::Unreliable { failure_rate })
        .controller(ControllerId('A'), &["L1"])
        .controller(ControllerId('B'), &["L1"])
        .build()?
        .run_until_complete(opts.max_duration)
        .await
}

/// One controller probing a line only an absent peer could drive
pub async fn run_one_way(opts: &ScenarioOptions) -> Result<ScenarioOutcome, ScenarioError> {
    info!("one-way-line scenario");

    ScenarioBuilder::new()
        .timing(opts.timing.clone())
        .line(
            "L1",
            LineKind::OneWay {
                sender: ControllerId('A'),
            },
        )
        .controller(ControllerId('B'), &["L1"])
        .build()?
        .run_until_complete(opts.max_duration)
        .await
}

/// One controller on a line a latched pinger holds high
///
/// The controller keeps deferring to the phantom carrier, never sees a
/// decodable signal, and blacklists the line as disturbed once the
/// false-response ceiling is crossed.
pub async fn run_disturbed(opts: &ScenarioOptions) -> Result<ScenarioOutcome, ScenarioError> {
    info!("disturbed-line scenario");

    let scenario = ScenarioBuilder::new()
        .timing(opts.timing.clone())
        .line("L1", LineKind::Reliable)
        .controller(ControllerId('A'), &["L1"])
        .build()?;

    let line = scenario
        .line("L1")
        .expect("line declared above");
    let mut pinger = Pinger::latched(ControllerId('P'), line);
    pinger.start();

    let outcome = scenario.run_until_complete(opts.max_duration).await;

    pinger.stop();
    pinger.join().await;
    outcome
}

/// Two controllers forced into the same contention slot on one line
pub async fn run_collision(opts: &ScenarioOptions) -> Result<ScenarioOutcome, ScenarioError> {
    info!("collision scenario");

    let timing = SignalTiming {
        slot_max: Duration::ZERO,
        ..opts.timing.clone()
    };
    ScenarioBuilder::new()
        .timing(timing)
        .line("L1", LineKind::Reliable)
        .controller(ControllerId('A'), &["L1"])
        .controller(ControllerId('B'), &["L1"])
        .build()?
        .run_until_complete(opts.max_duration)
        .await
}

/// Two controllers on separate lines, cross-wired by a bridge
pub async fn run_bridged(opts: &ScenarioOptions) -> Result<ScenarioOutcome, ScenarioError> {
    info!("bridged scenario");

    let scenario = ScenarioBuilder::new()
        .timing(opts.timing.clone())
        .line("L1", LineKind::Reliable)
        .line("L2", LineKind::Reliable)
        .controller(ControllerId('A'), &["L1"])
        .controller(ControllerId('B'), &["L2"])
        .build()?;

    let left = scenario.line("L1").expect("line declared above");
    let right = scenario.line("L2").expect("line declared above");
    let mut bridge = Bridge::new(ControllerId('X'), vec![left, right]);
    bridge.start();

    let outcome = scenario.run_until_complete(opts.max_duration).await;

    bridge.stop();
    bridge.join().await;
    outcome
}
