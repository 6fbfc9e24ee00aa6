//! # Wirepair Controller
//!
//! One controller's half of the pairing protocol: two independently
//! scheduled workers over a shared set of lines.
//!
//! - [`LineMonitor`]: polls every visible line, times pulses, classifies
//!   their durations, and queues [`DecodedSignal`]s for the engine.
//! - [`NegotiationEngine`]: the finite-state machine that contends for a
//!   line, runs the SYN / SYN_ACK / ACK handshake, resolves collisions, and
//!   finalizes one [`PinRecord`] per line.
//! - [`Controller`]: owns both workers (start/stop/join), the pin records,
//!   and the outbound report channel.
//!
//! The monitor and the engine communicate one-way over an unbounded
//! channel; the engine drains it fully each iteration and never blocks on
//! the monitor. Every engine wait is a deadline-bounded polling loop that
//! observes the stop signal within one tick.
//!
//! [`DecodedSignal`]: wirepair_core::DecodedSignal

pub mod controller;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod pin;

pub use controller::Controller;
pub use engine::{EngineState, NegotiationEngine};
pub use error::ControllerError;
pub use monitor::LineMonitor;
pub use pin::PinRecord;
