//! Service layer
//!
//! Collaborators the stages delegate real media work to. All services are
//! trait-based so that tests and alternative backends can swap them in.

mod analyser;
mod devices;
mod processor;
mod transcoder;

use std::sync::Arc;

use crate::config::RunnerConfig;

// Re-export traits
pub use analyser::ContentAnalyser;
pub use devices::DeviceService;
pub use processor::FrameProcessor;
pub use transcoder::Transcoder;

// Re-export implementations
pub use analyser::PermissiveAnalyser;
pub use devices::{CPU_PROVIDER, CUDA_PROVIDER, StandardDeviceService};
pub use processor::PassthroughProcessor;
pub use transcoder::{
    AudioRequest, FfmpegTranscoder, FrameRequest, MediaInfo, MergeRequest, parse_probe_output,
};

/// The services a standard pipeline's stages are bound to
#[derive(Clone)]
pub struct Toolkit {
    pub transcoder: Arc<dyn Transcoder>,
    pub analyser: Arc<dyn ContentAnalyser>,
    pub processor: Arc<dyn FrameProcessor>,
}

impl Toolkit {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        analyser: Arc<dyn ContentAnalyser>,
        processor: Arc<dyn FrameProcessor>,
    ) -> Self {
        Self {
            transcoder,
            analyser,
            processor,
        }
    }

    /// ffmpeg transcoder, permissive analyser, passthrough processor
    pub fn standard(config: &RunnerConfig) -> Self {
        Self::new(
            Arc::new(FfmpegTranscoder::new(
                config.ffmpeg_path.clone(),
                config.ffprobe_path.clone(),
            )),
            Arc::new(PermissiveAnalyser),
            Arc::new(PassthroughProcessor),
        )
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transcoder that writes placeholder files

    use super::*;
    use crate::lifecycle::LifecycleController;
    use crate::media::{Resolution, frame_path};
    use std::collections::HashSet;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    pub struct FakeTranscoder {
        pub info: MediaInfo,
        pub calls: Mutex<Vec<String>>,
        failing: HashSet<&'static str>,
        stopping: HashSet<&'static str>,
    }

    impl FakeTranscoder {
        pub fn new() -> Self {
            Self {
                info: MediaInfo {
                    resolution: Some(Resolution::new(64, 48)),
                    fps: Some(30.0),
                    frame_total: Some(4),
                    duration: Some(0.2),
                },
                calls: Mutex::new(Vec::new()),
                failing: HashSet::new(),
                stopping: HashSet::new(),
            }
        }

        /// Makes `op` fail
        pub fn failing(mut self, op: &'static str) -> Self {
            self.failing.insert(op);
            self
        }

        /// Makes `op` request a stop and fail, as a killed child would
        pub fn stopping_during(mut self, op: &'static str) -> Self {
            self.stopping.insert(op);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn enter(&self, op: &'static str, lifecycle: &LifecycleController) -> bool {
            self.calls.lock().unwrap().push(op.to_string());
            if self.stopping.contains(op) {
                lifecycle.request_stop();
                return false;
            }
            !self.failing.contains(op)
        }

        fn copy(from: &Path, to: &Path) -> bool {
            fs::copy(from, to).is_ok()
        }

        fn write_frames(request: &FrameRequest) -> bool {
            if fs::create_dir_all(&request.frames_dir).is_err() {
                return false;
            }
            let count = request.trim.1.saturating_sub(request.trim.0).max(1);
            (1..=count).all(|index| {
                fs::write(
                    frame_path(&request.frames_dir, index, &request.frame_format),
                    b"frame",
                )
                .is_ok()
            })
        }
    }

    impl Transcoder for FakeTranscoder {
        fn probe(&self, path: &Path) -> Option<MediaInfo> {
            self.calls.lock().unwrap().push("probe".to_string());
            path.exists().then(|| self.info.clone())
        }

        fn sanitize(&self, input: &Path, output: &Path, lifecycle: &LifecycleController) -> bool {
            self.enter("sanitize", lifecycle) && Self::copy(input, output)
        }

        fn convert_image(
            &self,
            input: &Path,
            output: &Path,
            _resolution: Resolution,
            _quality: u32,
            lifecycle: &LifecycleController,
        ) -> bool {
            self.enter("convert_image", lifecycle) && Self::copy(input, output)
        }

        fn extract_frames(&self, request: &FrameRequest, lifecycle: &LifecycleController) -> bool {
            self.enter("extract_frames", lifecycle) && Self::write_frames(request)
        }

        fn spawn_frames(&self, request: &FrameRequest, lifecycle: &LifecycleController) -> bool {
            self.enter("spawn_frames", lifecycle) && Self::write_frames(request)
        }

        fn merge_frames(&self, request: &MergeRequest, lifecycle: &LifecycleController) -> bool {
            self.enter("merge_frames", lifecycle) && fs::write(&request.output, b"video").is_ok()
        }

        fn restore_audio(&self, request: &AudioRequest, lifecycle: &LifecycleController) -> bool {
            self.enter("restore_audio", lifecycle) && Self::copy(&request.video, &request.output)
        }

        fn replace_audio(&self, request: &AudioRequest, lifecycle: &LifecycleController) -> bool {
            self.enter("replace_audio", lifecycle) && Self::copy(&request.video, &request.output)
        }
    }

    /// Toolkit around `transcoder` with the default analyser and processor
    pub fn toolkit(transcoder: Arc<FakeTranscoder>) -> Toolkit {
        Toolkit::new(
            transcoder,
            Arc::new(PermissiveAnalyser),
            Arc::new(PassthroughProcessor),
        )
    }
}
