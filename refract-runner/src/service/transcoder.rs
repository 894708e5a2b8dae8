//! Transcoder service
//!
//! Wraps the external transcoding tools. Stages only see the boolean
//! contract of each operation; the default implementation shells out to
//! ffmpeg and ffprobe.
//!
//! Long-running operations take the run's lifecycle controller and kill the
//! child process as soon as a stop is requested.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::lifecycle::LifecycleController;
use crate::media::{Resolution, frame_pattern};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bytes of ffmpeg stderr kept for the debug log
const STDERR_TAIL: usize = 16 * 1024;

/// What a probe learned about a media file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub resolution: Option<Resolution>,
    pub fps: Option<f64>,
    pub frame_total: Option<u32>,
    /// Seconds
    pub duration: Option<f64>,
}

/// Frame extraction or spawning parameters
#[derive(Debug, Clone)]
pub struct FrameRequest {
    pub input: PathBuf,
    pub frames_dir: PathBuf,
    pub frame_format: String,
    pub resolution: Resolution,
    pub fps: f64,
    /// Frame range `[start, end)` at `fps`
    pub trim: (u32, u32),
}

/// Frame merging parameters
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub frames_dir: PathBuf,
    pub frame_format: String,
    pub output: PathBuf,
    pub resolution: Resolution,
    pub fps: f64,
    pub quality: u32,
}

/// Audio muxing parameters
#[derive(Debug, Clone)]
pub struct AudioRequest {
    /// File the audio track is taken from
    pub audio: PathBuf,
    /// Silent video produced by the merge stage
    pub video: PathBuf,
    pub output: PathBuf,
    /// Seconds range of `audio` to keep
    pub range: Option<(f64, f64)>,
    /// Percent, 100 keeps the original level
    pub volume: u32,
}

/// Service trait for media transcoding
pub trait Transcoder: Send + Sync {
    /// Reads resolution, frame rate, frame total and duration
    fn probe(&self, path: &Path) -> Option<MediaInfo>;

    /// Re-encodes an uploaded image into a canonical file, dropping metadata
    fn sanitize(&self, input: &Path, output: &Path, lifecycle: &LifecycleController) -> bool;

    /// Re-encodes a single image at `resolution`
    fn convert_image(
        &self,
        input: &Path,
        output: &Path,
        resolution: Resolution,
        quality: u32,
        lifecycle: &LifecycleController,
    ) -> bool;

    /// Decodes the frames of a video into numbered images
    fn extract_frames(&self, request: &FrameRequest, lifecycle: &LifecycleController) -> bool;

    /// Repeats a still image into numbered frames
    fn spawn_frames(&self, request: &FrameRequest, lifecycle: &LifecycleController) -> bool;

    /// Encodes numbered frames into a video
    fn merge_frames(&self, request: &MergeRequest, lifecycle: &LifecycleController) -> bool;

    /// Muxes the trimmed audio of the original target into the video
    fn restore_audio(&self, request: &AudioRequest, lifecycle: &LifecycleController) -> bool;

    /// Muxes a separate audio source into the video
    fn replace_audio(&self, request: &AudioRequest, lifecycle: &LifecycleController) -> bool;
}

/// ffmpeg/ffprobe backed transcoder
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegTranscoder {
    /// Creates a transcoder using the given executables
    ///
    /// # Arguments
    /// * `ffmpeg` - Path or name of the ffmpeg binary
    /// * `ffprobe` - Path or name of the ffprobe binary
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        Self { ffmpeg, ffprobe }
    }

    fn ffmpeg(&self) -> Command {
        let mut command = Command::new(&self.ffmpeg);
        command.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]);
        command
    }

    /// Runs ffmpeg to completion, killing it when the run starts stopping
    ///
    /// stderr is drained on a separate thread while the child runs so a
    /// chatty child never blocks on a full pipe.
    fn run(&self, mut command: Command, label: &str, lifecycle: &LifecycleController) -> bool {
        debug!("Running {}: {:?}", label, command);

        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn {} for {}: {}", self.ffmpeg.display(), label, e);
                return false;
            }
        };
        let stderr = child.stderr.take().map(|pipe| thread::spawn(move || drain(pipe)));

        let success = loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        warn!("{} exited with code {}", label, status.code().unwrap_or(-1));
                    }
                    break status.success();
                }
                Ok(None) if lifecycle.is_stopping() => {
                    debug!("Stop requested, killing {}", label);
                    let _ = child.kill();
                    let _ = child.wait();
                    break false;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    error!("Failed to wait for {}: {}", label, e);
                    let _ = child.kill();
                    let _ = child.wait();
                    break false;
                }
            }
        };

        if let Some(Ok(tail)) = stderr.map(thread::JoinHandle::join) {
            let tail = String::from_utf8_lossy(&tail);
            if !tail.trim().is_empty() {
                debug!("{} stderr: {}", label, tail.trim());
            }
        }
        success
    }
}

/// Reads `pipe` to the end, keeping only the last `STDERR_TAIL` bytes
fn drain(mut pipe: impl Read) -> Vec<u8> {
    let mut tail = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match pipe.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                tail.extend_from_slice(&chunk[..read]);
                if tail.len() > STDERR_TAIL {
                    tail.drain(..tail.len() - STDERR_TAIL);
                }
            }
        }
    }
    tail
}

fn scale_filter(resolution: Resolution) -> String {
    format!("scale={}:{}", resolution.width, resolution.height)
}

/// Maps 0..=100 quality onto ffmpeg's 31..=1 qscale range
fn image_qscale(quality: u32) -> u32 {
    let quality = quality.min(100);
    31 - (quality * 30 / 100)
}

/// Maps 0..=100 quality onto a 51..=0 crf range
fn video_crf(quality: u32) -> u32 {
    let quality = quality.min(100);
    51 - (quality * 51 / 100)
}

fn volume_filter(volume: u32) -> String {
    format!("volume={:.2}", volume as f64 / 100.0)
}

impl Transcoder for FfmpegTranscoder {
    fn probe(&self, path: &Path) -> Option<MediaInfo> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_entries"])
            .arg("stream=width,height,r_frame_rate,nb_frames:format=duration")
            .args(["-of", "default=noprint_wrappers=1"])
            .arg(path)
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to execute {}: {}", self.ffprobe.display(), e);
                return None;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("ffprobe failed for {}: {}", path.display(), stderr.trim());
            return None;
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn sanitize(&self, input: &Path, output: &Path, lifecycle: &LifecycleController) -> bool {
        let mut command = self.ffmpeg();
        command
            .arg("-i")
            .arg(input)
            .args(["-map_metadata", "-1", "-frames:v", "1"])
            .arg(output);
        self.run(command, "sanitize", lifecycle)
    }

    fn convert_image(
        &self,
        input: &Path,
        output: &Path,
        resolution: Resolution,
        quality: u32,
        lifecycle: &LifecycleController,
    ) -> bool {
        let mut command = self.ffmpeg();
        command
            .arg("-i")
            .arg(input)
            .args(["-frames:v", "1", "-vf", &scale_filter(resolution)])
            .args(["-q:v", &image_qscale(quality).to_string()])
            .arg(output);
        self.run(command, "convert image", lifecycle)
    }

    fn extract_frames(&self, request: &FrameRequest, lifecycle: &LifecycleController) -> bool {
        let (start, end) = request.trim;
        let filter = format!(
            "trim=start_frame={}:end_frame={},{},fps={}",
            start,
            end,
            scale_filter(request.resolution),
            request.fps
        );

        let mut command = self.ffmpeg();
        command
            .arg("-i")
            .arg(&request.input)
            .args(["-vf", &filter, "-vsync", "0", "-q:v", "0"])
            .arg(frame_pattern(&request.frames_dir, &request.frame_format));
        self.run(command, "extract frames", lifecycle)
    }

    fn spawn_frames(&self, request: &FrameRequest, lifecycle: &LifecycleController) -> bool {
        let (start, end) = request.trim;
        let count = end.saturating_sub(start).max(1);

        let mut command = self.ffmpeg();
        command
            .args(["-loop", "1", "-framerate", &request.fps.to_string()])
            .arg("-i")
            .arg(&request.input)
            .args(["-vf", &scale_filter(request.resolution)])
            .args(["-frames:v", &count.to_string(), "-q:v", "0"])
            .arg(frame_pattern(&request.frames_dir, &request.frame_format));
        self.run(command, "spawn frames", lifecycle)
    }

    fn merge_frames(&self, request: &MergeRequest, lifecycle: &LifecycleController) -> bool {
        let mut command = self.ffmpeg();
        command
            .args(["-framerate", &request.fps.to_string()])
            .arg("-i")
            .arg(frame_pattern(&request.frames_dir, &request.frame_format))
            .args(["-vf", &scale_filter(request.resolution)])
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .args(["-crf", &video_crf(request.quality).to_string()])
            .arg(&request.output);
        self.run(command, "merge frames", lifecycle)
    }

    fn restore_audio(&self, request: &AudioRequest, lifecycle: &LifecycleController) -> bool {
        let mut command = self.ffmpeg();
        command.arg("-i").arg(&request.video);
        if let Some((start, end)) = request.range {
            command
                .args(["-ss", &format!("{:.3}", start)])
                .args(["-to", &format!("{:.3}", end)]);
        }
        command
            .arg("-i")
            .arg(&request.audio)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"])
            .args(["-af", &volume_filter(request.volume), "-shortest"])
            .arg(&request.output);
        self.run(command, "restore audio", lifecycle)
    }

    fn replace_audio(&self, request: &AudioRequest, lifecycle: &LifecycleController) -> bool {
        let mut command = self.ffmpeg();
        command
            .arg("-i")
            .arg(&request.video)
            .arg("-i")
            .arg(&request.audio)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"])
            .args(["-af", &volume_filter(request.volume), "-shortest"])
            .arg(&request.output);
        self.run(command, "replace audio", lifecycle)
    }
}

/// Parses `key=value` lines printed by ffprobe
///
/// The first usable value of each key wins, so the first video stream
/// describes the file. `N/A` values are ignored.
pub fn parse_probe_output(output: &str) -> Option<MediaInfo> {
    let mut info = MediaInfo::default();
    let mut width = None;
    let mut height = None;

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        if value == "N/A" || value.is_empty() {
            continue;
        }

        match key {
            "width" if width.is_none() => width = value.parse::<u32>().ok(),
            "height" if height.is_none() => height = value.parse::<u32>().ok(),
            "r_frame_rate" if info.fps.is_none() => info.fps = parse_rate(value),
            "nb_frames" if info.frame_total.is_none() => info.frame_total = value.parse().ok(),
            "duration" if info.duration.is_none() => info.duration = value.parse().ok(),
            _ => {}
        }
    }

    if let (Some(width), Some(height)) = (width, height) {
        info.resolution = Some(Resolution::new(width, height));
    }

    if info.frame_total.is_none() {
        if let (Some(fps), Some(duration)) = (info.fps, info.duration) {
            info.frame_total = Some((fps * duration).round() as u32);
        }
    }

    if info == MediaInfo::default() {
        return None;
    }
    Some(info)
}

/// Parses `num/den` or a plain number
fn parse_rate(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_probe() {
        let output = "width=1920\nheight=1080\nr_frame_rate=30000/1001\nnb_frames=300\nr_frame_rate=0/0\nduration=10.010000\n";
        let info = parse_probe_output(output).unwrap();

        assert_eq!(info.resolution, Some(Resolution::new(1920, 1080)));
        assert!((info.fps.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(info.frame_total, Some(300));
        assert_eq!(info.duration, Some(10.01));
    }

    #[test]
    fn test_parse_probe_derives_frame_total() {
        let output = "width=640\nheight=480\nr_frame_rate=25/1\nnb_frames=N/A\nduration=4.0\n";
        let info = parse_probe_output(output).unwrap();
        assert_eq!(info.frame_total, Some(100));
    }

    #[test]
    fn test_parse_audio_probe() {
        let output = "r_frame_rate=0/0\nnb_frames=N/A\nduration=3.5\n";
        let info = parse_probe_output(output).unwrap();
        assert_eq!(info.resolution, None);
        assert_eq!(info.fps, None);
        assert_eq!(info.duration, Some(3.5));
    }

    #[test]
    fn test_parse_empty_probe() {
        assert_eq!(parse_probe_output(""), None);
        assert_eq!(parse_probe_output("garbage\n"), None);
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(image_qscale(100), 1);
        assert_eq!(image_qscale(0), 31);
        assert_eq!(video_crf(100), 0);
        assert_eq!(video_crf(0), 51);
        assert_eq!(volume_filter(50), "volume=0.50");
    }

    #[test]
    fn test_missing_binary_fails_cleanly() {
        let transcoder = FfmpegTranscoder::new(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        );
        let lifecycle = LifecycleController::new();
        assert!(!transcoder.sanitize(Path::new("in.png"), Path::new("out.png"), &lifecycle));
        assert!(transcoder.probe(Path::new("in.png")).is_none());
    }

    #[test]
    fn test_drain_keeps_tail() {
        let noise: Vec<u8> = (0..STDERR_TAIL + 100).map(|i| (i % 251) as u8).collect();
        let tail = drain(noise.as_slice());

        assert_eq!(tail.len(), STDERR_TAIL);
        assert_eq!(tail.as_slice(), &noise[100..]);
    }

    /// Writes an executable shell script standing in for ffmpeg
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> FfmpegTranscoder {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        FfmpegTranscoder::new(script, PathBuf::from("ffprobe"))
    }

    /// Runs `sanitize` on another thread, giving up after `timeout`
    #[cfg(unix)]
    fn sanitize_within(
        transcoder: FfmpegTranscoder,
        lifecycle: LifecycleController,
        timeout: Duration,
    ) -> Option<bool> {
        let (sender, receiver) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let done = transcoder.sanitize(Path::new("in.png"), Path::new("out.png"), &lifecycle);
            let _ = sender.send(done);
        });
        receiver.recv_timeout(timeout).ok()
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_child_does_not_block() {
        let dir = tempfile::TempDir::new().unwrap();
        let transcoder = fake_ffmpeg(dir.path(), "head -c 200000 /dev/zero >&2\nexit 0");

        let done = sanitize_within(transcoder, LifecycleController::new(), Duration::from_secs(10));

        assert_eq!(done, Some(true));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_child_reports_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let transcoder = fake_ffmpeg(dir.path(), "echo broken >&2\nexit 3");

        let done = sanitize_within(transcoder, LifecycleController::new(), Duration::from_secs(10));

        assert_eq!(done, Some(false));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_interrupts_sanitize() {
        let dir = tempfile::TempDir::new().unwrap();
        let transcoder = fake_ffmpeg(dir.path(), "exec sleep 30");
        let lifecycle = LifecycleController::new();
        lifecycle.start().unwrap();

        let stopper = lifecycle.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            stopper.request_stop();
        });
        let done = sanitize_within(transcoder, lifecycle, Duration::from_secs(10));

        assert_eq!(done, Some(false));
    }
}
