use thiserror::Error;

use crate::{location::LocationError, persistence::PersistenceError, session::WalkState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("select a pet before starting a walk")]
    NoPetSelected,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    LocationUnavailable(#[from] LocationError),

    #[error("failed to save walk: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("cannot {action} a walk while {from}")]
    InvalidTransition { from: WalkState, action: &'static str },

    /// The tracker task is gone, so the command could not be delivered.
    #[error("walk tracker is not running")]
    TrackerStopped,
}
