//! Scenario wiring and execution
//!
//! A scenario is a fixed set of named lines, each with a fidelity kind, and
//! a set of controllers attached to ordered subsets of those lines. Lines
//! may be shared, cross-wired, or exclusive. The harness starts every
//! controller, waits (fixed duration or until completion), stops and joins
//! everything, and collects the results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use wirepair_controller::{Controller, ControllerError};
use wirepair_core::{
    ControllerId, ControllerReport, LineName, LineSet, LineStatus, PinSnapshot, Role, SharedLine,
    SignalTiming, TimingError,
};
use wirepair_line::{ActivityTrace, LineKind, TraceEntry, build_line};

/// Errors raised while building or running a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Timing configuration rejected: {0}")]
    Timing(#[from] TimingError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Line {0} is declared twice")]
    DuplicateLine(LineName),

    #[error("Controller {0} is declared twice")]
    DuplicateController(ControllerId),

    #[error("Controller {controller} references unknown line {line}")]
    UnknownLine {
        controller: ControllerId,
        line: LineName,
    },
}

/// Declarative scenario configuration
pub struct ScenarioBuilder {
    timing: SignalTiming,
    lines: Vec<(LineName, LineKind)>,
    controllers: Vec<(ControllerId, Vec<LineName>)>,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self {
            timing: SignalTiming::default(),
            lines: Vec::new(),
            controllers: Vec::new(),
        }
    }

    /// Use this timing configuration for every controller
    pub fn timing(mut self, timing: SignalTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Declare a line
    pub fn line(mut self, name: impl Into<LineName>, kind: LineKind) -> Self {
        self.lines.push((name.into(), kind));
        self
    }

    /// Attach a controller to an ordered set of declared lines
    pub fn controller(mut self, id: ControllerId, lines: &[&str]) -> Self {
        self.controllers
            .push((id, lines.iter().map(|&name| name.into()).collect()));
        self
    }

    /// Wire everything up
    pub fn build(self) -> Result<Scenario, ScenarioError> {
        self.timing.validate()?;

        let trace = Arc::new(ActivityTrace::new());
        let mut lines: Vec<(LineName, Arc<dyn SharedLine>)> = Vec::new();
        for (name, kind) in &self.lines {
            if lines.iter().any(|(existing, _)| existing == name) {
                return Err(ScenarioError::DuplicateLine(name.clone()));
            }
            lines.push((name.clone(), build_line(name.clone(), kind, Some(trace.clone()))));
        }

        let mut controllers = Vec::new();
        let mut report_rxs = Vec::new();
        for (id, wanted) in &self.controllers {
            if controllers
                .iter()
                .any(|c: &Controller| c.id() == *id)
            {
                return Err(ScenarioError::DuplicateController(*id));
            }
            let mut visible = Vec::new();
            for name in wanted {
                let line = lines
                    .iter()
                    .find(|(existing, _)| existing == name)
                    .map(|(_, line)| line.clone())
                    .ok_or_else(|| ScenarioError::UnknownLine {
                        controller: *id,
                        line: name.clone(),
                    })?;
                visible.push(line);
            }
            let mut controller = Controller::new(*id, LineSet::new(visible), self.timing.clone());
            if let Some(rx) = controller.take_reports() {
                report_rxs.push(rx);
            }
            controllers.push(controller);
        }

        Ok(Scenario {
            controllers,
            report_rxs,
            lines,
            trace,
        })
    }
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired scenario, ready to run
pub struct Scenario {
    controllers: Vec<Controller>,
    report_rxs: Vec<mpsc::UnboundedReceiver<ControllerReport>>,
    lines: Vec<(LineName, Arc<dyn SharedLine>)>,
    trace: Arc<ActivityTrace>,
}

impl Scenario {
    /// Access a line, e.g. to script a peer or attach an auxiliary actor
    pub fn line(&self, name: &str) -> Option<Arc<dyn SharedLine>> {
        let name: LineName = name.into();
        self.lines
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, line)| line.clone())
    }

    /// Start everything, run for a fixed duration, then stop and collect
    ///
    /// The original driver shape: controllers get a fixed window and are
    /// stopped regardless of progress, so the outcome may hold partial
    /// results.
    pub async fn run_for(mut self, duration: Duration) -> Result<ScenarioOutcome, ScenarioError> {
        self.start_all()?;
        tokio::time::sleep(duration).await;
        self.finish().await
    }

    /// Start everything and run until every controller has tested every
    /// line, capped at `max_duration`
    pub async fn run_until_complete(
        mut self,
        max_duration: Duration,
    ) -> Result<ScenarioOutcome, ScenarioError> {
        self.start_all()?;

        let deadline = tokio::time::Instant::now() + max_duration;
        while tokio::time::Instant::now() < deadline {
            if self.controllers.iter().all(|c| c.is_complete()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.finish().await
    }

    fn start_all(&mut self) -> Result<(), ScenarioError> {
        info!(
            controllers = self.controllers.len(),
            lines = self.lines.len(),
            "scenario starting"
        );
        for controller in &mut self.controllers {
            controller.start()?;
        }
        Ok(())
    }

    async fn finish(mut self) -> Result<ScenarioOutcome, ScenarioError> {
        for controller in &self.controllers {
            controller.stop();
        }
        for controller in &mut self.controllers {
            controller.join().await?;
        }

        let mut reports = Vec::new();
        for rx in &mut self.report_rxs {
            while let Ok(report) = rx.try_recv() {
                reports.push(report);
            }
        }

        let pins = self
            .controllers
            .iter()
            .map(|c| (c.id(), c.pins()))
            .collect();

        info!(reports = reports.len(), "scenario finished");
        Ok(ScenarioOutcome {
            reports,
            pins,
            trace: self.trace.entries(),
        })
    }
}

/// Everything a scenario produced
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// All controller reports, grouped per controller in emission order
    pub reports: Vec<ControllerReport>,
    /// Final pin snapshots per controller, in line-configuration order
    pub pins: HashMap<ControllerId, Vec<PinSnapshot>>,
    /// Every drive/release transition across the run
    pub trace: Vec<TraceEntry>,
}

impl ScenarioOutcome {
    /// (controller, line, role) of every WORKING report
    pub fn working(&self) -> Vec<(ControllerId, LineName, Option<Role>)> {
        self.line_reports(LineStatus::Working)
    }

    /// (controller, line, role) of every FAILED report
    pub fn failed(&self) -> Vec<(ControllerId, LineName, Option<Role>)> {
        self.line_reports(LineStatus::Failed)
    }

    fn line_reports(&self, wanted: LineStatus) -> Vec<(ControllerId, LineName, Option<Role>)> {
        self.reports
            .iter()
            .filter_map(|report| match report {
                ControllerReport::LineTested {
                    controller,
                    line,
                    status,
                    role,
                    ..
                } if *status == wanted => Some((*controller, line.clone(), *role)),
                _ => None,
            })
            .collect()
    }

    /// Roles assigned on one line across all successful pairings
    pub fn roles_on(&self, line: &LineName) -> Vec<(ControllerId, Role)> {
        self.working()
            .into_iter()
            .filter(|(_, reported, _)| reported == line)
            .filter_map(|(controller, _, role)| role.map(|role| (controller, role)))
            .collect()
    }

    /// White and black lists from a controller's completion report
    pub fn completed(
        &self,
        id: ControllerId,
    ) -> Option<(&Vec<PinSnapshot>, &Vec<PinSnapshot>)> {
        self.reports.iter().find_map(|report| match report {
            ControllerReport::Completed {
                controller,
                white_list,
                black_list,
                ..
            } if *controller == id => Some((white_list, black_list)),
            _ => None,
        })
    }

    /// Final pin snapshot for one (controller, line) pair
    pub fn pin(&self, id: ControllerId, line: &LineName) -> Option<&PinSnapshot> {
        self.pins
            .get(&id)
            .and_then(|pins| pins.iter().find(|pin| pin.line == *line))
    }

    /// Human-readable result table
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for report in &self.reports {
            match report {
                ControllerReport::LineTested {
                    controller,
                    line,
                    status,
                    role,
                    ..
                } => {
                    let role = role.map_or_else(|| "-".to_string(), |r| r.to_string());
                    let _ = writeln!(out, "[{controller}] {line}: {status} ({role})");
                }
                ControllerReport::Completed {
                    controller,
                    white_list,
                    black_list,
                    ..
                } => {
                    let names = |pins: &[PinSnapshot]| {
                        pins.iter()
                            .map(|pin| pin.line.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    };
                    let _ = writeln!(
                        out,
                        "[{controller}] completed: white=[{}] black=[{}]",
                        names(white_list),
                        names(black_list)
                    );
                }
            }
        }
        out
    }

    /// Reports as JSON lines, for log aggregation
    pub fn to_jsonl(&self) -> String {
        self.reports
            .iter()
            .filter_map(|report| serde_json::to_string(report).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
