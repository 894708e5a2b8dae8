//! Stages for audio-driven frame spawning and frame-directory outputs

use refract_core::domain::result::ResultCode;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::context::JobContext;
use crate::media::{
    are_images, first_audio, resolve_temp_frame_paths, restrict_trim_frame, scale_resolution,
};
use crate::service::{FrameRequest, Toolkit};
use crate::workflow::common::{DEFAULT_OUTPUT_FPS, temp_dir, tool_failed};

/// Repeats the target image for the length of the source audio
pub fn spawn_frames(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let (Some(target), Some(dir)) = (context.target().map(Path::to_path_buf), temp_dir(context))
    else {
        return ResultCode::Failure;
    };
    let Some(audio) = first_audio(context.sources()).map(Path::to_path_buf) else {
        error!("No source audio to spawn frames for");
        return ResultCode::Failure;
    };
    let Some(duration) = toolkit
        .transcoder
        .probe(&audio)
        .and_then(|info| info.duration)
    else {
        error!("Could not detect duration of {}", audio.display());
        return ResultCode::Failure;
    };
    let Some(resolution) = toolkit
        .transcoder
        .probe(&target)
        .and_then(|info| info.resolution)
    else {
        error!("Could not detect resolution of {}", target.display());
        return ResultCode::Failure;
    };

    let fps = context.output_video_fps.unwrap_or(DEFAULT_OUTPUT_FPS);
    let frame_total = (duration * fps).ceil() as u32;
    let request = FrameRequest {
        input: target,
        frames_dir: dir,
        frame_format: context.frame_format().to_string(),
        resolution: scale_resolution(resolution, context.image_scale()),
        fps,
        trim: restrict_trim_frame(frame_total, context.trim_frame_start, context.trim_frame_end),
    };

    info!(
        "Spawning {} frames with a resolution of {}",
        request.trim.1.saturating_sub(request.trim.0),
        request.resolution
    );
    if !toolkit.transcoder.spawn_frames(&request, context.lifecycle()) {
        return tool_failed(context, "Spawning frames");
    }
    ResultCode::Success
}

/// Copies the processed frames into the output directory
pub fn copy_frames(context: &mut JobContext, _toolkit: &Toolkit) -> ResultCode {
    let (Some(output), Some(dir)) = (context.output().map(Path::to_path_buf), temp_dir(context))
    else {
        return ResultCode::Failure;
    };

    if let Err(e) = fs::create_dir_all(&output) {
        error!("Failed to create {}: {}", output.display(), e);
        return ResultCode::Failure;
    }

    for frame in resolve_temp_frame_paths(&dir, context.frame_format()) {
        if context.is_stopping() {
            return ResultCode::Cancelled;
        }
        let Some(name) = frame.file_name() else {
            continue;
        };
        if let Err(e) = fs::copy(&frame, output.join(name)) {
            error!("Failed to copy {}: {}", frame.display(), e);
            return ResultCode::Failure;
        }
    }
    ResultCode::Success
}

pub fn finalize_frames(context: &mut JobContext, _toolkit: &Toolkit) -> ResultCode {
    match context.output() {
        Some(output) if are_images(output) => {
            info!("Processing to frames succeeded: {}", output.display());
            ResultCode::Success
        }
        _ => {
            error!("Processing to frames failed");
            ResultCode::Failure
        }
    }
}
