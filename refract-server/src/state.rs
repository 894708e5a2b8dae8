//! Shared handler state

use refract_core::dto::metrics::ExecutionDevice;
use std::sync::Arc;

use crate::service::processing::PayloadPipeline;
use crate::service::session::SessionRegistry;

/// State cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub pipeline: Arc<PayloadPipeline>,
    /// Discovered once at startup
    pub execution_devices: Arc<Vec<ExecutionDevice>>,
}
