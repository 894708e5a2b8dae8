//! Stages for video outputs

use refract_core::domain::result::ResultCode;
use refract_core::domain::workflow::TargetMedia;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::context::JobContext;
use crate::media::{
    first_audio, is_video, resolve_temp_frame_paths, restrict_trim_frame, scale_resolution,
    temp_video_path,
};
use crate::service::{AudioRequest, FrameRequest, MergeRequest, Toolkit};
use crate::workflow::common::{DEFAULT_OUTPUT_FPS, move_file, temp_dir, tool_failed};

fn output_fps(context: &JobContext) -> f64 {
    context.output_video_fps.unwrap_or(DEFAULT_OUTPUT_FPS)
}

/// Decodes the trimmed target video into scratch frames
pub fn extract_frames(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let (Some(target), Some(dir)) = (context.target().map(Path::to_path_buf), temp_dir(context))
    else {
        return ResultCode::Failure;
    };
    let Some(info) = toolkit.transcoder.probe(&target) else {
        error!("Could not probe {}", target.display());
        return ResultCode::Failure;
    };
    let Some(resolution) = info.resolution else {
        error!("{} has no video stream", target.display());
        return ResultCode::Failure;
    };

    let request = FrameRequest {
        input: target,
        frames_dir: dir,
        frame_format: context.frame_format().to_string(),
        resolution: scale_resolution(resolution, context.video_scale()),
        fps: output_fps(context),
        trim: restrict_trim_frame(
            info.frame_total.unwrap_or(0),
            context.trim_frame_start,
            context.trim_frame_end,
        ),
    };

    info!(
        "Extracting frames with a resolution of {} and {} frames per second",
        request.resolution, request.fps
    );
    if !toolkit.transcoder.extract_frames(&request, context.lifecycle()) {
        return tool_failed(context, "Extracting frames");
    }
    ResultCode::Success
}

/// Encodes the processed frames into a silent temp video
pub fn merge_frames(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let (Some(target), Some(output), Some(dir)) = (
        context.target().map(Path::to_path_buf),
        context.output().map(Path::to_path_buf),
        temp_dir(context),
    ) else {
        return ResultCode::Failure;
    };
    let format = context.frame_format().to_string();
    if resolve_temp_frame_paths(&dir, &format).is_empty() {
        error!("No frames to merge in {}", dir.display());
        return ResultCode::Failure;
    }
    let Some(resolution) = toolkit
        .transcoder
        .probe(&target)
        .and_then(|info| info.resolution)
    else {
        error!("Could not detect resolution of {}", target.display());
        return ResultCode::Failure;
    };

    let request = MergeRequest {
        output: temp_video_path(&dir, &output),
        frames_dir: dir,
        frame_format: format,
        resolution: scale_resolution(resolution, context.video_scale()),
        fps: output_fps(context),
        quality: context.video_quality(),
    };

    info!(
        "Merging video with a resolution of {} and {} frames per second",
        request.resolution, request.fps
    );
    if !toolkit.transcoder.merge_frames(&request, context.lifecycle()) {
        return tool_failed(context, "Merging video");
    }
    ResultCode::Success
}

/// Muxes audio into the temp video and moves it to the output path
///
/// A volume of 0 skips audio. A source audio file replaces the track;
/// otherwise the target video's own audio is restored. When muxing fails
/// the silent video is kept unless the run is stopping.
pub fn restore_audio(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let (Some(target), Some(output), Some(dir)) = (
        context.target().map(Path::to_path_buf),
        context.output().map(Path::to_path_buf),
        temp_dir(context),
    ) else {
        return ResultCode::Failure;
    };
    let video = temp_video_path(&dir, &output);
    let keep_silent = |context: &JobContext| {
        if move_file(&video, &output) {
            ResultCode::Success
        } else {
            tool_failed(context, "Moving temp video")
        }
    };

    if context.audio_volume() == 0 {
        info!("Skipping audio");
        return keep_silent(context);
    }

    let source_audio = first_audio(context.sources()).map(Path::to_path_buf);
    let restored = match source_audio {
        Some(audio) => {
            let request = AudioRequest {
                audio,
                video: video.clone(),
                output: output.clone(),
                range: None,
                volume: context.audio_volume(),
            };
            toolkit.transcoder.replace_audio(&request, context.lifecycle())
        }
        None if context.workflow.map(|kind| kind.target_media()) == Some(TargetMedia::Video) => {
            let frame_total = resolve_temp_frame_paths(&dir, context.frame_format()).len() as u32;
            let (start, end) =
                restrict_trim_frame(frame_total, context.trim_frame_start, context.trim_frame_end);
            let fps = output_fps(context);
            let request = AudioRequest {
                audio: target,
                video: video.clone(),
                output: output.clone(),
                range: Some((start as f64 / fps, end as f64 / fps)),
                volume: context.audio_volume(),
            };
            toolkit.transcoder.restore_audio(&request, context.lifecycle())
        }
        None => {
            debug!("No audio to restore");
            return keep_silent(context);
        }
    };

    if restored {
        debug!("Restoring audio succeeded");
        let _ = std::fs::remove_file(&video);
        return ResultCode::Success;
    }
    if context.is_stopping() {
        return ResultCode::Cancelled;
    }
    warn!("Restoring audio skipped, keeping silent video");
    keep_silent(context)
}

pub fn finalize_video(context: &mut JobContext, _toolkit: &Toolkit) -> ResultCode {
    match context.output() {
        Some(output) if is_video(output) => {
            info!("Processing to video succeeded: {}", output.display());
            ResultCode::Success
        }
        _ => {
            error!("Processing to video failed");
            ResultCode::Failure
        }
    }
}
