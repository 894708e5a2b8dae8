//! Capabilities DTO

use serde::{Deserialize, Serialize};

use crate::domain::workflow::WorkflowKind;

pub const IMAGE_FORMATS: [&str; 5] = ["bmp", "jpeg", "png", "tiff", "webp"];
pub const VIDEO_FORMATS: [&str; 6] = ["avi", "m4v", "mkv", "mov", "mp4", "webm"];
pub const AUDIO_FORMATS: [&str; 6] = ["flac", "m4a", "mp3", "ogg", "opus", "wav"];

/// Media formats and workflows supported by this server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub formats: Formats,
    pub workflows: Vec<WorkflowKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formats {
    pub audio: Vec<String>,
    pub image: Vec<String>,
    pub video: Vec<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        let owned = |formats: &[&str]| formats.iter().map(|f| f.to_string()).collect();
        Self {
            formats: Formats {
                audio: owned(&AUDIO_FORMATS),
                image: owned(&IMAGE_FORMATS),
                video: owned(&VIDEO_FORMATS),
            },
            workflows: WorkflowKind::ALL.to_vec(),
        }
    }
}
