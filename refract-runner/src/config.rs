//! Runner configuration
//!
//! Defines the tool locations and the process-wide defaults that are seeded
//! into every job context before argument or request values are applied.

use anyhow::Context;
use refract_core::domain::context::{
    ContextKey, ContextValue, TEMP_FRAME_FORMATS, is_temp_frame_format,
};
use std::path::PathBuf;

use crate::context::{
    DEFAULT_IMAGE_QUALITY, DEFAULT_TEMP_FRAME_FORMAT, DEFAULT_VIDEO_QUALITY, JobContext,
};

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root directory for scratch files
    pub temp_path: PathBuf,

    /// ffmpeg executable
    pub ffmpeg_path: PathBuf,

    /// ffprobe executable
    pub ffprobe_path: PathBuf,

    /// Image format of extracted frames
    pub temp_frame_format: String,

    pub output_image_quality: u32,

    pub output_video_quality: u32,

    /// Threads handed to the frame processor
    pub execution_thread_count: u32,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new(temp_path: PathBuf) -> Self {
        Self {
            temp_path,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            temp_frame_format: DEFAULT_TEMP_FRAME_FORMAT.to_string(),
            output_image_quality: DEFAULT_IMAGE_QUALITY,
            output_video_quality: DEFAULT_VIDEO_QUALITY,
            execution_thread_count: 4,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - REFRACT_TEMP_PATH (optional, default: system temp dir)
    /// - REFRACT_FFMPEG (optional, default: ffmpeg)
    /// - REFRACT_FFPROBE (optional, default: ffprobe)
    /// - REFRACT_TEMP_FRAME_FORMAT (optional, default: png)
    /// - REFRACT_THREAD_COUNT (optional, default: 4)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("REFRACT_TEMP_PATH") {
            config.temp_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("REFRACT_FFMPEG") {
            config.ffmpeg_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("REFRACT_FFPROBE") {
            config.ffprobe_path = PathBuf::from(path);
        }
        if let Ok(format) = std::env::var("REFRACT_TEMP_FRAME_FORMAT") {
            config.temp_frame_format = format.to_ascii_lowercase();
        }
        if let Ok(count) = std::env::var("REFRACT_THREAD_COUNT") {
            config.execution_thread_count = count
                .parse()
                .context("REFRACT_THREAD_COUNT must be a positive integer")?;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.temp_path.as_os_str().is_empty() {
            anyhow::bail!("temp_path cannot be empty");
        }

        if !is_temp_frame_format(&self.temp_frame_format) {
            anyhow::bail!(
                "temp_frame_format must be one of {} (got '{}')",
                TEMP_FRAME_FORMATS.join(", "),
                self.temp_frame_format
            );
        }

        if self.output_image_quality > 100 || self.output_video_quality > 100 {
            anyhow::bail!("output quality must be between 0 and 100");
        }

        if self.execution_thread_count == 0 {
            anyhow::bail!("execution_thread_count must be greater than 0");
        }

        Ok(())
    }

    /// Seeds defaults into `context` without overwriting values already set
    pub fn apply_defaults(&self, context: &mut JobContext) -> anyhow::Result<()> {
        let defaults = [
            (ContextKey::TempPath, ContextValue::Path(self.temp_path.clone())),
            (
                ContextKey::TempFrameFormat,
                ContextValue::Text(self.temp_frame_format.clone()),
            ),
            (
                ContextKey::OutputImageQuality,
                ContextValue::Integer(self.output_image_quality),
            ),
            (
                ContextKey::OutputVideoQuality,
                ContextValue::Integer(self.output_video_quality),
            ),
            (
                ContextKey::ExecutionThreadCount,
                ContextValue::Integer(self.execution_thread_count),
            ),
        ];

        for (key, value) in defaults {
            context
                .init_if_absent(key, value)
                .with_context(|| format!("Failed to apply default for {}", key))?;
        }
        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.temp_frame_format, "png");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RunnerConfig::default();

        config.temp_frame_format = "gif".to_string();
        assert!(config.validate().is_err());
        config.temp_frame_format = "jpg".to_string();
        assert!(config.validate().is_ok());

        config.output_video_quality = 101;
        assert!(config.validate().is_err());
        config.output_video_quality = 90;

        config.execution_thread_count = 0;
        assert!(config.validate().is_err());

        config.execution_thread_count = 1;
        config.temp_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_defaults_keeps_existing_values() {
        let config = RunnerConfig::new(PathBuf::from("/scratch"));
        let mut context = JobContext::new();
        context.output_image_quality = Some(95);

        config.apply_defaults(&mut context).unwrap();

        assert_eq!(context.output_image_quality, Some(95));
        assert_eq!(context.output_video_quality, Some(DEFAULT_VIDEO_QUALITY));
        assert_eq!(context.temp_path(), PathBuf::from("/scratch"));
        assert_eq!(context.execution_thread_count, Some(4));
    }
}
