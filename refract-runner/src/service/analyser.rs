//! Content analyser service
//!
//! Decides whether a target may be processed at all. A rejection ends the
//! pipeline with `Rejected` before any file is written.

use std::path::Path;
use tracing::debug;

/// Service trait for content policy checks
pub trait ContentAnalyser: Send + Sync {
    /// Returns `true` when the image must be rejected
    fn analyse_image(&self, path: &Path) -> bool;

    /// Returns `true` when frames `[start, end)` of the video must be rejected
    fn analyse_video(&self, path: &Path, trim_frame_start: u32, trim_frame_end: u32) -> bool;
}

/// Analyser that accepts everything
#[derive(Debug, Default)]
pub struct PermissiveAnalyser;

impl ContentAnalyser for PermissiveAnalyser {
    fn analyse_image(&self, path: &Path) -> bool {
        debug!("Accepting image {}", path.display());
        false
    }

    fn analyse_video(&self, path: &Path, trim_frame_start: u32, trim_frame_end: u32) -> bool {
        debug!(
            "Accepting video {} frames {}..{}",
            path.display(),
            trim_frame_start,
            trim_frame_end
        );
        false
    }
}
