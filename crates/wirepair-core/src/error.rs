//! Error types for the Wirepair stack

use std::time::Duration;

use thiserror::Error;

use crate::signal::SignalKind;

/// Top-level error type
#[derive(Debug, Error)]
pub enum WirepairError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Timing error: {0}")]
    Timing(#[from] TimingError),
}

/// Errors related to identities
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid controller identity: {0:?} (expected one capital letter)")]
    InvalidController(String),
}

/// Errors in a [`SignalTiming`] configuration
///
/// [`SignalTiming`]: crate::timing::SignalTiming
#[derive(Debug, Error)]
pub enum TimingError {
    #[error("Duration field {field} must be non-zero")]
    ZeroDuration { field: &'static str },

    #[error("Classification windows of {first} and {second} overlap")]
    OverlappingWindows { first: SignalKind, second: SignalKind },

    #[error(
        "Echo window {echo_window:?} reaches into the smallest legitimate \
         inter-signal gap {min_gap:?}"
    )]
    EchoWindowTooWide {
        echo_window: Duration,
        min_gap: Duration,
    },

    #[error("False-response ceiling must be at least 1")]
    ZeroFalseResponseCeiling,
}
