//! Workflow catalog
//!
//! Maps each workflow kind to its ordered stage list. Every standard
//! pipeline has the same frame:
//!
//! analyse, clear, setup, (media-specific stages), finalize, clear
//!
//! Pipelines are plain lists, so new kinds are built by concatenating
//! existing stages with `compose` and adding them with `register`.

pub mod common;
pub mod frames;
pub mod image;
pub mod video;

use refract_core::domain::result::ResultCode;
use refract_core::domain::workflow::{TargetMedia, WorkflowKind};
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::JobContext;
use crate::service::Toolkit;
use crate::stage::{StageRef, stage};

/// Signature of a standard stage before it is bound to a toolkit
pub type StageFn = fn(&mut JobContext, &Toolkit) -> ResultCode;

/// Binds a stage function to a toolkit
pub fn bind(toolkit: &Arc<Toolkit>, name: &str, func: StageFn) -> StageRef {
    let toolkit = Arc::clone(toolkit);
    stage(name, move |context: &mut JobContext| func(context, &toolkit))
}

/// Concatenates stage lists in order
pub fn compose(parts: &[&[StageRef]]) -> Vec<StageRef> {
    parts.iter().flat_map(|part| part.iter().cloned()).collect()
}

/// Ordered stage lists keyed by workflow kind
#[derive(Default)]
pub struct WorkflowCatalog {
    pipelines: HashMap<WorkflowKind, Vec<StageRef>>,
}

impl WorkflowCatalog {
    /// Creates an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the catalog of the five standard workflows bound to `toolkit`
    pub fn standard(toolkit: Arc<Toolkit>) -> Self {
        let analyse_image = bind(&toolkit, "analyse_image", common::analyse_image);
        let analyse_video = bind(&toolkit, "analyse_video", common::analyse_video);
        let clear = bind(&toolkit, "clear", common::clear);
        let setup = bind(&toolkit, "setup", common::setup);
        let process_frames = bind(&toolkit, "process_frames", common::process_frames);

        let create_image_frame = bind(&toolkit, "create_image_frame", image::create_image_frame);
        let merge_image = bind(&toolkit, "merge_image", image::merge_image);
        let finalize_image = bind(&toolkit, "finalize_image", image::finalize_image);

        let extract_frames = bind(&toolkit, "extract_frames", video::extract_frames);
        let merge_frames = bind(&toolkit, "merge_frames", video::merge_frames);
        let restore_audio = bind(&toolkit, "restore_audio", video::restore_audio);
        let finalize_video = bind(&toolkit, "finalize_video", video::finalize_video);

        let spawn_frames = bind(&toolkit, "spawn_frames", frames::spawn_frames);
        let copy_frames = bind(&toolkit, "copy_frames", frames::copy_frames);
        let finalize_frames = bind(&toolkit, "finalize_frames", frames::finalize_frames);

        let pipeline = |kind: WorkflowKind, middle: &[StageRef], finalize: &StageRef| {
            let analyse = match kind.target_media() {
                TargetMedia::Image => &analyse_image,
                TargetMedia::Video => &analyse_video,
            };
            compose(&[
                &[analyse.clone(), clear.clone(), setup.clone()],
                middle,
                &[finalize.clone(), clear.clone()],
            ])
        };

        let mut catalog = Self::new();
        catalog.register(
            WorkflowKind::ImageToImage,
            pipeline(
                WorkflowKind::ImageToImage,
                &[create_image_frame, process_frames.clone(), merge_image],
                &finalize_image,
            ),
        );
        catalog.register(
            WorkflowKind::ImageToVideo,
            pipeline(
                WorkflowKind::ImageToVideo,
                &[
                    extract_frames.clone(),
                    process_frames.clone(),
                    merge_frames.clone(),
                    restore_audio.clone(),
                ],
                &finalize_video,
            ),
        );
        catalog.register(
            WorkflowKind::ImageToVideoAsFrames,
            pipeline(
                WorkflowKind::ImageToVideoAsFrames,
                &[extract_frames, process_frames.clone(), copy_frames.clone()],
                &finalize_frames,
            ),
        );
        catalog.register(
            WorkflowKind::AudioToImage,
            pipeline(
                WorkflowKind::AudioToImage,
                &[
                    spawn_frames.clone(),
                    process_frames.clone(),
                    merge_frames,
                    restore_audio,
                ],
                &finalize_video,
            ),
        );
        catalog.register(
            WorkflowKind::AudioToImageAsFrames,
            pipeline(
                WorkflowKind::AudioToImageAsFrames,
                &[spawn_frames, process_frames, copy_frames],
                &finalize_frames,
            ),
        );
        catalog
    }

    /// Adds or replaces the pipeline of `kind`
    pub fn register(&mut self, kind: WorkflowKind, stages: Vec<StageRef>) {
        self.pipelines.insert(kind, stages);
    }

    pub fn stages(&self, kind: WorkflowKind) -> Option<&[StageRef]> {
        self.pipelines.get(&kind).map(Vec::as_slice)
    }

    /// Stage names of the pipeline of `kind`, in execution order
    pub fn stage_names(&self, kind: WorkflowKind) -> Option<Vec<&str>> {
        self.stages(kind)
            .map(|stages| stages.iter().map(|stage| stage.name()).collect())
    }

    /// Registered kinds in their canonical order
    pub fn kinds(&self) -> Vec<WorkflowKind> {
        WorkflowKind::ALL
            .into_iter()
            .filter(|kind| self.pipelines.contains_key(kind))
            .collect()
    }
}
