//! Configuration module
//!
//! Resolves runner settings from the environment and command-line flags.

use anyhow::{Context, Result};
use refract_runner::RunnerConfig;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub runner: RunnerConfig,
}

impl Config {
    /// Reads `REFRACT_*` variables, then applies flag overrides
    pub fn load(temp_path: Option<PathBuf>, ffmpeg: Option<PathBuf>) -> Result<Self> {
        let mut runner = RunnerConfig::from_env()?;

        if let Some(path) = temp_path {
            runner.temp_path = path;
        }
        if let Some(path) = ffmpeg {
            runner.ffmpeg_path = path;
        }

        runner.validate().context("Invalid runner configuration")?;
        Ok(Self { runner })
    }
}
