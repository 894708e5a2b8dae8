//! Metrics DTO

use serde::{Deserialize, Serialize};

/// A device an inference backend can execute on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDevice {
    pub provider: String,
    pub name: String,
}

/// Snapshot of server activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub active_sessions: usize,
    pub processing_sessions: usize,
    pub execution_devices: Vec<ExecutionDevice>,
}
