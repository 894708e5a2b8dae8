//! Lifecycle controller
//!
//! Tracks whether a pipeline run is in progress or being cancelled:
//! Idle -> Processing -> (Stopping) -> Idle.
//!
//! Every job context owns its own controller, so a stop request aimed at
//! one session never aborts another session's run. Clones share state:
//! the executor, the stages, an external cancel command and a metrics
//! reporter all observe the same run.

use refract_core::domain::lifecycle::{LifecycleError, LifecycleState};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use tracing::debug;

const IDLE: u8 = 0;
const PROCESSING: u8 = 1;
const STOPPING: u8 = 2;

fn decode(raw: u8) -> LifecycleState {
    match raw {
        PROCESSING => LifecycleState::Processing,
        STOPPING => LifecycleState::Stopping,
        _ => LifecycleState::Idle,
    }
}

/// Handle to a run's lifecycle state
#[derive(Debug, Clone, Default)]
pub struct LifecycleController {
    state: Arc<AtomicU8>,
    completed: Arc<AtomicU64>,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle -> Processing
    ///
    /// Fails with `InvalidStateTransition` if a run is already open.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.state
            .compare_exchange(IDLE, PROCESSING, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| debug!("Lifecycle started"))
            .map_err(|current| LifecycleError::InvalidStateTransition {
                from: decode(current),
                to: LifecycleState::Processing,
            })
    }

    /// Processing | Stopping -> Idle. Idempotent when already idle.
    pub fn end(&self) {
        let previous = self.state.swap(IDLE, Ordering::AcqRel);
        if previous != IDLE {
            self.completed.fetch_add(1, Ordering::AcqRel);
            debug!("Lifecycle ended (was {})", decode(previous));
        }
    }

    /// Processing -> Stopping. No effect when idle or already stopping.
    ///
    /// Returns whether the request moved the controller into Stopping.
    pub fn request_stop(&self) -> bool {
        let moved = self
            .state
            .compare_exchange(PROCESSING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            debug!("Lifecycle stop requested");
        }
        moved
    }

    pub fn state(&self) -> LifecycleState {
        decode(self.state.load(Ordering::Acquire))
    }

    pub fn is_processing(&self) -> bool {
        self.state() == LifecycleState::Processing
    }

    pub fn is_stopping(&self) -> bool {
        self.state() == LifecycleState::Stopping
    }

    pub fn is_idle(&self) -> bool {
        self.state() == LifecycleState::Idle
    }

    /// Number of runs this controller has closed
    pub fn completed_runs(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }
}
