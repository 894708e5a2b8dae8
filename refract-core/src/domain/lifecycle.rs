//! Lifecycle domain types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State of a lifecycle controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No job is running
    Idle,

    /// A pipeline run is in progress
    Processing,

    /// A stop was requested while processing; stages should exit promptly
    Stopping,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Idle => write!(f, "Idle"),
            LifecycleState::Processing => write!(f, "Processing"),
            LifecycleState::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Controller misuse. Correct callers never see this.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidStateTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}
