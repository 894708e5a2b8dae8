//! Job context for pipeline runs
//!
//! Contains all configuration a stage reads, plus the lifecycle controller
//! of the run it belongs to:
//! - Workflow kind and paths (temp, sources, target, output)
//! - Trim bounds and frame format
//! - Output quality, scale, frame rate and audio volume
//! - Execution settings
//!
//! Fields are typed; `get`/`set`/`init_if_absent` give keyed access using
//! the `ContextKey` vocabulary from the core crate.

use refract_core::domain::context::{ContextError, ContextKey, ContextValue};
use refract_core::domain::workflow::WorkflowKind;
use std::path::{Path, PathBuf};

use crate::lifecycle::LifecycleController;

pub const DEFAULT_TEMP_FRAME_FORMAT: &str = "png";
pub const DEFAULT_IMAGE_QUALITY: u32 = 80;
pub const DEFAULT_VIDEO_QUALITY: u32 = 80;
pub const DEFAULT_AUDIO_VOLUME: u32 = 100;

macro_rules! job_context {
    ($($key:ident => $field:ident : $ty:ty as $variant:ident),* $(,)?) => {
        /// Mutable configuration threaded through one pipeline run
        #[derive(Debug, Default)]
        pub struct JobContext {
            $(pub $field: Option<$ty>,)*
            lifecycle: LifecycleController,
        }

        impl JobContext {
            /// Reads a value by key
            pub fn get(&self, key: ContextKey) -> Option<ContextValue> {
                match key {
                    $(ContextKey::$key => self.$field.clone().map(ContextValue::$variant),)*
                }
            }

            /// Writes a value by key, rejecting values of the wrong kind
            pub fn set(
                &mut self,
                key: ContextKey,
                value: ContextValue,
            ) -> Result<(), ContextError> {
                match (key, value) {
                    $((ContextKey::$key, ContextValue::$variant(value)) => {
                        self.$field = Some(value);
                        Ok(())
                    })*
                    (key, value) => Err(ContextError::TypeMismatch {
                        key,
                        expected: key.kind(),
                        actual: value.kind(),
                    }),
                }
            }

            /// Removes the value stored under a key
            pub fn unset(&mut self, key: ContextKey) {
                match key {
                    $(ContextKey::$key => self.$field = None,)*
                }
            }

            /// Copies every value into a new context with its own lifecycle controller
            pub fn fork(&self) -> Self {
                Self {
                    $($field: self.$field.clone(),)*
                    lifecycle: LifecycleController::new(),
                }
            }
        }
    };
}

job_context! {
    Workflow => workflow: WorkflowKind as Workflow,
    TempPath => temp_path: PathBuf as Path,
    SourcePaths => source_paths: Vec<PathBuf> as Paths,
    TargetPath => target_path: PathBuf as Path,
    OutputPath => output_path: PathBuf as Path,
    TrimFrameStart => trim_frame_start: u32 as Integer,
    TrimFrameEnd => trim_frame_end: u32 as Integer,
    TempFrameFormat => temp_frame_format: String as Text,
    OutputImageQuality => output_image_quality: u32 as Integer,
    OutputImageScale => output_image_scale: f64 as Float,
    OutputVideoQuality => output_video_quality: u32 as Integer,
    OutputVideoScale => output_video_scale: f64 as Float,
    OutputVideoFps => output_video_fps: f64 as Float,
    OutputAudioVolume => output_audio_volume: u32 as Integer,
    ExecutionProviders => execution_providers: Vec<String> as List,
    ExecutionDeviceIds => execution_device_ids: Vec<String> as List,
    ExecutionThreadCount => execution_thread_count: u32 as Integer,
}

impl JobContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value only if the key is unset
    ///
    /// Returns whether the value was written. Used to apply defaults
    /// without clobbering values cached by earlier stages or requests.
    pub fn init_if_absent(
        &mut self,
        key: ContextKey,
        value: ContextValue,
    ) -> Result<bool, ContextError> {
        if self.get(key).is_some() {
            if value.kind() != key.kind() {
                return Err(ContextError::TypeMismatch {
                    key,
                    expected: key.kind(),
                    actual: value.kind(),
                });
            }
            return Ok(false);
        }
        self.set(key, value)?;
        Ok(true)
    }

    /// The lifecycle controller of this context's runs
    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    /// Shortcut for stages polling for a pending cancellation
    pub fn is_stopping(&self) -> bool {
        self.lifecycle.is_stopping()
    }

    /// Clears the per-payload paths between runs
    pub fn clear_run_paths(&mut self) {
        self.target_path = None;
        self.output_path = None;
    }

    pub fn temp_path(&self) -> PathBuf {
        self.temp_path.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn frame_format(&self) -> &str {
        self.temp_frame_format
            .as_deref()
            .unwrap_or(DEFAULT_TEMP_FRAME_FORMAT)
    }

    pub fn image_quality(&self) -> u32 {
        self.output_image_quality.unwrap_or(DEFAULT_IMAGE_QUALITY)
    }

    pub fn video_quality(&self) -> u32 {
        self.output_video_quality.unwrap_or(DEFAULT_VIDEO_QUALITY)
    }

    pub fn image_scale(&self) -> f64 {
        self.output_image_scale.unwrap_or(1.0)
    }

    pub fn video_scale(&self) -> f64 {
        self.output_video_scale.unwrap_or(1.0)
    }

    pub fn audio_volume(&self) -> u32 {
        self.output_audio_volume.unwrap_or(DEFAULT_AUDIO_VOLUME)
    }

    /// Source paths as a slice, empty when none were declared
    pub fn sources(&self) -> &[PathBuf] {
        self.source_paths.as_deref().unwrap_or(&[])
    }

    /// Whether any source material has been declared
    pub fn has_sources(&self) -> bool {
        !self.sources().is_empty()
    }

    pub fn target(&self) -> Option<&Path> {
        self.target_path.as_deref()
    }

    pub fn output(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }
}
