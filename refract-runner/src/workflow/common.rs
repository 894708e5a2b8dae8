//! Stages shared by every standard pipeline

use refract_core::domain::context::{ContextKey, ContextValue};
use refract_core::domain::result::ResultCode;
use refract_core::domain::workflow::TargetMedia;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::context::JobContext;
use crate::media::{job_temp_dir, resolve_temp_frame_paths, restrict_trim_frame};
use crate::service::Toolkit;

/// Frame rate used when the target carries none (still images)
pub const DEFAULT_OUTPUT_FPS: f64 = 25.0;

/// Reports a failed tool call, as `Cancelled` when the run is stopping
pub(crate) fn tool_failed(context: &JobContext, what: &str) -> ResultCode {
    if context.is_stopping() {
        debug!("{} interrupted by stop request", what);
        return ResultCode::Cancelled;
    }
    error!("{} failed", what);
    ResultCode::Failure
}

/// Scratch directory of the current job
pub(crate) fn temp_dir(context: &JobContext) -> Option<PathBuf> {
    context
        .output()
        .map(|output| job_temp_dir(&context.temp_path(), output))
}

pub(crate) fn move_file(from: &Path, to: &Path) -> bool {
    if fs::rename(from, to).is_ok() {
        return true;
    }
    match fs::copy(from, to) {
        Ok(_) => fs::remove_file(from).is_ok(),
        Err(e) => {
            warn!("Failed to move {} to {}: {}", from.display(), to.display(), e);
            false
        }
    }
}

pub fn analyse_image(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let Some(target) = context.target() else {
        error!("No target path set");
        return ResultCode::Failure;
    };

    if toolkit.analyser.analyse_image(target) {
        warn!("Target {} rejected by content analysis", target.display());
        return ResultCode::Rejected;
    }
    ResultCode::Success
}

pub fn analyse_video(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let Some(target) = context.target() else {
        error!("No target path set");
        return ResultCode::Failure;
    };

    let frame_total = toolkit
        .transcoder
        .probe(target)
        .and_then(|info| info.frame_total)
        .unwrap_or(0);
    let (start, end) =
        restrict_trim_frame(frame_total, context.trim_frame_start, context.trim_frame_end);

    if toolkit.analyser.analyse_video(target, start, end) {
        warn!("Target {} rejected by content analysis", target.display());
        return ResultCode::Rejected;
    }
    ResultCode::Success
}

/// Removes the job's scratch directory; succeeds when there is nothing to remove
pub fn clear(context: &mut JobContext, _toolkit: &Toolkit) -> ResultCode {
    let Some(dir) = temp_dir(context) else {
        return ResultCode::Success;
    };

    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(&dir) {
            error!("Failed to clear {}: {}", dir.display(), e);
            return ResultCode::Failure;
        }
        debug!("Cleared {}", dir.display());
    }
    ResultCode::Success
}

/// Validates paths, caches the output frame rate and creates the scratch directory
pub fn setup(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let Some(kind) = context.workflow else {
        error!("No workflow set");
        return ResultCode::Failure;
    };
    let Some(target) = context.target().map(Path::to_path_buf) else {
        error!("No target path set");
        return ResultCode::Failure;
    };
    if !target.is_file() {
        error!("Target {} does not exist", target.display());
        return ResultCode::Failure;
    }
    let Some(output) = context.output().map(Path::to_path_buf) else {
        error!("No output path set");
        return ResultCode::Failure;
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            error!("Output directory {} does not exist", parent.display());
            return ResultCode::Failure;
        }
    }

    let fps = match kind.target_media() {
        TargetMedia::Video => toolkit
            .transcoder
            .probe(&target)
            .and_then(|info| info.fps)
            .unwrap_or(DEFAULT_OUTPUT_FPS),
        TargetMedia::Image => DEFAULT_OUTPUT_FPS,
    };
    if let Ok(true) = context.init_if_absent(ContextKey::OutputVideoFps, ContextValue::Float(fps)) {
        debug!("Output frame rate set to {}", fps);
    }

    let Some(dir) = temp_dir(context) else {
        return ResultCode::Failure;
    };
    if let Err(e) = fs::create_dir_all(&dir) {
        error!("Failed to create {}: {}", dir.display(), e);
        return ResultCode::Failure;
    }

    info!("Prepared {} job for {}", kind, target.display());
    ResultCode::Success
}

/// Applies the frame processor to every scratch frame, polling for stop requests
pub fn process_frames(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let Some(dir) = temp_dir(context) else {
        return ResultCode::Failure;
    };
    let frames = resolve_temp_frame_paths(&dir, context.frame_format());
    if frames.is_empty() {
        error!("No frames found in {}", dir.display());
        return ResultCode::Failure;
    }

    info!(
        "Processing {} frames with {}",
        frames.len(),
        toolkit.processor.name()
    );

    for frame in &frames {
        if context.is_stopping() {
            return ResultCode::Cancelled;
        }
        if !toolkit.processor.process_frame(frame, context) {
            return tool_failed(context, &format!("Processing frame {}", frame.display()));
        }
    }
    ResultCode::Success
}
