//! Error types for controller lifecycle management

use thiserror::Error;

use wirepair_core::{ControllerId, TimingError};

/// Errors surfaced by [`Controller`] operations
///
/// [`Controller`]: crate::controller::Controller
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Controller {0} is already started")]
    AlreadyStarted(ControllerId),

    #[error("Controller {0} has no lines to test")]
    NoLines(ControllerId),

    #[error("Timing configuration rejected: {0}")]
    Timing(#[from] TimingError),

    #[error("Worker task failed to join: {0}")]
    Join(#[from] tokio::task::JoinError),
}
