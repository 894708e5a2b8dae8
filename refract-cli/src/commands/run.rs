//! Run command handler
//!
//! Builds a job context from flags, runs the workflow on a blocking
//! thread and exits with the run's result code. Ctrl-C requests a stop.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use refract_core::domain::result::ResultCode;
use refract_core::domain::workflow::WorkflowKind;
use refract_runner::service::{DeviceService, StandardDeviceService};
use refract_runner::{JobContext, PipelineExecutor, Toolkit, WorkflowCatalog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;

/// Arguments of `refract run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow to run, e.g. image-to-video
    #[arg(short, long)]
    pub workflow: WorkflowKind,

    /// Source material (faces, audio); repeat for several files
    #[arg(short, long = "source")]
    pub sources: Vec<PathBuf>,

    /// Target image or video
    #[arg(short, long)]
    pub target: PathBuf,

    /// Output file, or directory for frame outputs
    #[arg(short, long)]
    pub output: PathBuf,

    /// First frame to process
    #[arg(long)]
    pub trim_start: Option<u32>,

    /// Frame to stop before
    #[arg(long)]
    pub trim_end: Option<u32>,

    /// Scale factor applied to image outputs
    #[arg(long)]
    pub image_scale: Option<f64>,

    /// Scale factor applied to video outputs
    #[arg(long)]
    pub video_scale: Option<f64>,

    /// Output frame rate; defaults to the target's
    #[arg(long)]
    pub fps: Option<f64>,

    /// Audio volume in percent; 0 drops the audio track
    #[arg(long)]
    pub volume: Option<u32>,
}

impl RunArgs {
    /// Job context holding the flags; unset keys are filled from `config`
    pub fn into_context(self, config: &Config) -> Result<JobContext> {
        let mut context = JobContext::new();
        context.workflow = Some(self.workflow);
        context.source_paths = Some(self.sources);
        context.target_path = Some(self.target);
        context.output_path = Some(self.output);
        context.trim_frame_start = self.trim_start;
        context.trim_frame_end = self.trim_end;
        context.output_image_scale = self.image_scale;
        context.output_video_scale = self.video_scale;
        context.output_video_fps = self.fps;
        context.output_audio_volume = self.volume;

        config
            .runner
            .apply_defaults(&mut context)
            .context("Failed to apply runner defaults")?;
        Ok(context)
    }
}

/// Handle `refract run`
pub async fn handle_run_command(args: RunArgs, config: &Config) -> Result<()> {
    let workflow = args.workflow;
    let mut context = args.into_context(config)?;
    StandardDeviceService::new().apply_defaults(&mut context);

    let toolkit = Arc::new(Toolkit::standard(&config.runner));
    let executor = PipelineExecutor::new(Arc::new(WorkflowCatalog::standard(toolkit)));

    let lifecycle = context.lifecycle().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Stopping...".yellow());
            if lifecycle.request_stop() {
                warn!("Stop requested, waiting for the current stage to return");
            }
        }
    });

    println!("{} {}", "Running".bold(), workflow.as_str().cyan());
    let result = tokio::task::spawn_blocking(move || executor.run_context(&mut context))
        .await
        .context("Pipeline task failed")?;
    interrupt.abort();

    let code = result?;
    info!("Workflow {} finished with {} ({})", workflow, code, code.code());
    report(code);

    if !code.is_success() {
        std::process::exit(code.code());
    }
    Ok(())
}

fn report(code: ResultCode) {
    match code {
        ResultCode::Success => println!("{}", format!("✓ {}", code.message()).green().bold()),
        ResultCode::Cancelled => println!("{}", code.message().yellow()),
        ResultCode::Failure | ResultCode::Rejected => {
            eprintln!("{}", format!("✗ {}", code.message()).red().bold())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use refract_runner::RunnerConfig;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(args: &[&str]) -> RunArgs {
        TestCli::try_parse_from(std::iter::once("refract").chain(args.iter().copied()))
            .unwrap()
            .run
    }

    fn config() -> Config {
        Config {
            runner: RunnerConfig::new(PathBuf::from("/scratch")),
        }
    }

    #[test]
    fn test_flags_fill_context() {
        let args = parse(&[
            "-w",
            "image-to-video",
            "-s",
            "face.png",
            "--source",
            "voice.wav",
            "-t",
            "clip.mp4",
            "-o",
            "out.mp4",
            "--trim-start",
            "10",
            "--fps",
            "24",
            "--volume",
            "0",
        ]);

        let context = args.into_context(&config()).unwrap();

        assert_eq!(context.workflow, Some(WorkflowKind::ImageToVideo));
        assert_eq!(
            context.sources(),
            &[PathBuf::from("face.png"), PathBuf::from("voice.wav")]
        );
        assert_eq!(context.trim_frame_start, Some(10));
        assert_eq!(context.trim_frame_end, None);
        assert_eq!(context.output_video_fps, Some(24.0));
        assert_eq!(context.output_audio_volume, Some(0));
        assert_eq!(context.temp_path, Some(PathBuf::from("/scratch")));
    }

    #[test]
    fn test_unknown_workflow_is_rejected() {
        let parsed = TestCli::try_parse_from([
            "refract", "-w", "video-to-sound", "-t", "a.png", "-o", "b.png",
        ]);
        assert!(parsed.is_err());
    }
}
