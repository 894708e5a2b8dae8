//! Workflow domain types

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifier selecting which ordered stage list to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    ImageToImage,
    ImageToVideo,
    ImageToVideoAsFrames,
    AudioToImage,
    AudioToImageAsFrames,
}

/// Kind of media a workflow reads its target from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMedia {
    Image,
    Video,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 5] = [
        WorkflowKind::ImageToImage,
        WorkflowKind::ImageToVideo,
        WorkflowKind::ImageToVideoAsFrames,
        WorkflowKind::AudioToImage,
        WorkflowKind::AudioToImageAsFrames,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowKind::ImageToImage => "image-to-image",
            WorkflowKind::ImageToVideo => "image-to-video",
            WorkflowKind::ImageToVideoAsFrames => "image-to-video-as-frames",
            WorkflowKind::AudioToImage => "audio-to-image",
            WorkflowKind::AudioToImageAsFrames => "audio-to-image-as-frames",
        }
    }

    /// The media type of the target consumed by this workflow
    pub fn target_media(self) -> TargetMedia {
        match self {
            WorkflowKind::ImageToVideo | WorkflowKind::ImageToVideoAsFrames => TargetMedia::Video,
            WorkflowKind::ImageToImage
            | WorkflowKind::AudioToImage
            | WorkflowKind::AudioToImageAsFrames => TargetMedia::Image,
        }
    }

    /// Whether the output is a directory of frames rather than a single file
    pub fn outputs_frames(self) -> bool {
        matches!(
            self,
            WorkflowKind::ImageToVideoAsFrames | WorkflowKind::AudioToImageAsFrames
        )
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown workflow kind: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_kinds() {
        for kind in WorkflowKind::ALL {
            assert_eq!(kind.as_str().parse::<WorkflowKind>(), Ok(kind));
        }
        assert!("video-to-audio".parse::<WorkflowKind>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&WorkflowKind::ImageToVideoAsFrames).unwrap();
        assert_eq!(json, "\"image-to-video-as-frames\"");
    }

    #[test]
    fn test_target_media() {
        assert_eq!(WorkflowKind::ImageToImage.target_media(), TargetMedia::Image);
        assert_eq!(WorkflowKind::ImageToVideo.target_media(), TargetMedia::Video);
        assert!(WorkflowKind::AudioToImageAsFrames.outputs_frames());
        assert!(!WorkflowKind::AudioToImage.outputs_frames());
    }
}
