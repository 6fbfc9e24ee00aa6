//! # Wirepair Simulation
//!
//! Scenario wiring and the top-level driver for the Wirepair pairing
//! protocol.
//!
//! ## Architecture
//!
//! - **Harness** (`harness.rs`): declare lines by kind, attach controllers
//!   to ordered line-name lists, run the whole scenario for a fixed
//!   duration or until every controller completes, collect all reports,
//!   pin snapshots, and the line activity trace.
//! - **Actors** (`actors.rs`): auxiliary line actors, a [`Pinger`] that
//!   produces non-protocol pulses (or latches a line high) and a
//!   [`Bridge`] that cross-wires lines.
//! - **Scenarios** (`scenarios.rs`): pre-built scenarios behind the CLI.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use wirepair_core::{ControllerId, SignalTiming};
//! use wirepair_line::LineKind;
//! use wirepair_simulation::ScenarioBuilder;
//!
//! let outcome = ScenarioBuilder::new()
//!     .timing(SignalTiming::accelerated())
//!     .line("L1", LineKind::Reliable)
//!     .line("L2", LineKind::Unreliable { failure_rate: 0.2 })
//!     .controller(ControllerId('A'), &["L1", "L2"])
//!     .controller(ControllerId('B'), &["L1", "L2"])
//!     .build()?
//!     .run_until_complete(Duration::from_secs(60))
//!     .await?;
//!
//! println!("{}", outcome.summary());
//! ```

pub mod actors;
pub mod harness;
pub mod scenarios;

#[cfg(test)]
mod integration_scenarios;

pub use actors::{Bridge, Pinger};
pub use harness::{Scenario, ScenarioBuilder, ScenarioError, ScenarioOutcome};
