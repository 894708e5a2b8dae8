//! Media helpers
//!
//! Resolution arithmetic, trim restriction and the temp frame layout used
//! by the stages. Everything here is pure or touches only the file system.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use refract_core::dto::capabilities::{AUDIO_FORMATS, IMAGE_FORMATS, VIDEO_FORMATS};

/// Frame width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Rounds both dimensions down to even numbers, the encoders reject odd sizes
    pub fn normalize(self) -> Self {
        Self {
            width: (self.width & !1).max(2),
            height: (self.height & !1).max(2),
        }
    }
}

/// Packs as `WxH`
impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Scales a resolution by `scale` and normalizes it to even dimensions
pub fn scale_resolution(resolution: Resolution, scale: f64) -> Resolution {
    let width = (resolution.width as f64 * scale).round() as u32;
    let height = (resolution.height as f64 * scale).round() as u32;
    Resolution::new(width, height).normalize()
}

/// Clamps trim bounds into `[0, frame_total]`
///
/// A missing start becomes 0 and a missing end becomes `frame_total`.
pub fn restrict_trim_frame(
    frame_total: u32,
    trim_frame_start: Option<u32>,
    trim_frame_end: Option<u32>,
) -> (u32, u32) {
    let start = trim_frame_start.map_or(0, |start| start.min(frame_total));
    let end = trim_frame_end.map_or(frame_total, |end| end.min(frame_total));
    (start, end)
}

/// Scratch directory for the job producing `output_path`
pub fn job_temp_dir(temp_path: &Path, output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string());
    temp_path.join("refract").join(stem)
}

/// ffmpeg numbered frame pattern inside `dir`
pub fn frame_pattern(dir: &Path, format: &str) -> PathBuf {
    dir.join(format!("%08d.{}", format))
}

/// Path of the frame with 1-based index `index`
pub fn frame_path(dir: &Path, index: u32, format: &str) -> PathBuf {
    dir.join(format!("{:08}.{}", index, format))
}

/// Sorted list of the frames of `format` in `dir`
pub fn resolve_temp_frame_paths(dir: &Path, format: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| has_extension(path, &[format]))
        .collect();
    paths.sort();
    paths
}

/// Intermediate video written by the merge stage before audio is restored
pub fn temp_video_path(dir: &Path, output_path: &Path) -> PathBuf {
    let extension = output_path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    dir.join(format!("temp.{}", extension))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn has_extension(path: &Path, formats: &[&str]) -> bool {
    match extension_of(path) {
        Some(ext) => {
            let ext = if ext == "jpg" { "jpeg".to_string() } else { ext };
            formats.iter().any(|format| {
                let format = if *format == "jpg" { "jpeg" } else { format };
                format == ext
            })
        }
        None => false,
    }
}

fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

pub fn is_image(path: &Path) -> bool {
    has_extension(path, &IMAGE_FORMATS) && is_non_empty_file(path)
}

pub fn is_video(path: &Path) -> bool {
    has_extension(path, &VIDEO_FORMATS) && is_non_empty_file(path)
}

pub fn is_audio(path: &Path) -> bool {
    has_extension(path, &AUDIO_FORMATS) && is_non_empty_file(path)
}

/// Whether `dir` holds at least one image and nothing but images
pub fn are_images(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    let paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    !paths.is_empty() && paths.iter().all(|path| is_image(path))
}

/// First audio file among `paths`
pub fn first_audio(paths: &[PathBuf]) -> Option<&Path> {
    paths.iter().map(PathBuf::as_path).find(|path| is_audio(path))
}
