//! Stages for image outputs

use refract_core::domain::result::ResultCode;
use std::path::Path;
use tracing::{error, info};

use crate::context::JobContext;
use crate::media::{Resolution, frame_path, is_image, scale_resolution};
use crate::service::Toolkit;
use crate::workflow::common::{temp_dir, tool_failed};

const LOSSLESS: u32 = 100;

fn target_resolution(context: &JobContext, toolkit: &Toolkit) -> Option<Resolution> {
    let target = context.target()?;
    toolkit.transcoder.probe(target)?.resolution
}

/// Copies the target image into the scratch directory as frame 1
pub fn create_image_frame(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let (Some(target), Some(dir)) = (context.target().map(Path::to_path_buf), temp_dir(context))
    else {
        return ResultCode::Failure;
    };
    let Some(resolution) = target_resolution(context, toolkit) else {
        error!("Could not detect resolution of {}", target.display());
        return ResultCode::Failure;
    };
    let resolution = scale_resolution(resolution, context.image_scale());
    let frame = frame_path(&dir, 1, context.frame_format());

    info!("Creating image frame at {}", resolution);
    if !toolkit.transcoder.convert_image(
        &target,
        &frame,
        resolution,
        LOSSLESS,
        context.lifecycle(),
    ) {
        return tool_failed(context, "Creating image frame");
    }
    ResultCode::Success
}

/// Encodes the processed frame into the output image
pub fn merge_image(context: &mut JobContext, toolkit: &Toolkit) -> ResultCode {
    let (Some(output), Some(dir)) = (context.output().map(Path::to_path_buf), temp_dir(context))
    else {
        return ResultCode::Failure;
    };
    let Some(resolution) = target_resolution(context, toolkit) else {
        error!("Could not detect target resolution");
        return ResultCode::Failure;
    };
    let resolution = scale_resolution(resolution, context.image_scale());
    let frame = frame_path(&dir, 1, context.frame_format());

    info!("Merging image at {}", resolution);
    if !toolkit.transcoder.convert_image(
        &frame,
        &output,
        resolution,
        context.image_quality(),
        context.lifecycle(),
    ) {
        return tool_failed(context, "Merging image");
    }
    ResultCode::Success
}

pub fn finalize_image(context: &mut JobContext, _toolkit: &Toolkit) -> ResultCode {
    match context.output() {
        Some(output) if is_image(output) => {
            info!("Processing to image succeeded: {}", output.display());
            ResultCode::Success
        }
        _ => {
            error!("Processing to image failed");
            ResultCode::Failure
        }
    }
}
