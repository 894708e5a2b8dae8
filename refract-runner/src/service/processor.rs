//! Frame processor service
//!
//! The per-frame transform applied between frame creation and merging.
//! Implementations rewrite the frame file in place.

use std::path::Path;

use crate::context::JobContext;

/// Service trait for per-frame processing
pub trait FrameProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Processes one frame in place, returning whether it succeeded
    fn process_frame(&self, frame: &Path, context: &JobContext) -> bool;
}

/// Processor that leaves frames untouched
#[derive(Debug, Default)]
pub struct PassthroughProcessor;

impl FrameProcessor for PassthroughProcessor {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn process_frame(&self, frame: &Path, _context: &JobContext) -> bool {
        frame.is_file()
    }
}
