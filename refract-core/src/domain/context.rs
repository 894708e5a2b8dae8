//! Job context vocabulary
//!
//! The job context is a fixed, typed record. These types name its fields
//! (`ContextKey`), describe what each field holds (`ValueKind`) and carry
//! values through the generic `get`/`set` interface (`ContextValue`).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::workflow::WorkflowKind;

/// Image formats intermediate frames may be written in
pub const TEMP_FRAME_FORMATS: [&str; 5] = ["bmp", "jpg", "jpeg", "png", "tiff"];

/// Whether `format` names one of `TEMP_FRAME_FORMATS`
///
/// The format becomes a file extension, so nothing else may pass.
pub fn is_temp_frame_format(format: &str) -> bool {
    TEMP_FRAME_FORMATS.contains(&format)
}

/// Recognized job context keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    Workflow,
    TempPath,
    SourcePaths,
    TargetPath,
    OutputPath,
    TrimFrameStart,
    TrimFrameEnd,
    TempFrameFormat,
    OutputImageQuality,
    OutputImageScale,
    OutputVideoQuality,
    OutputVideoScale,
    OutputVideoFps,
    OutputAudioVolume,
    ExecutionProviders,
    ExecutionDeviceIds,
    ExecutionThreadCount,
}

/// Shape of the value stored under a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Workflow,
    Path,
    Paths,
    Integer,
    Float,
    Text,
    List,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Workflow => "workflow",
            ValueKind::Path => "path",
            ValueKind::Paths => "paths",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::List => "list",
        };
        write!(f, "{}", name)
    }
}

impl ContextKey {
    pub const ALL: [ContextKey; 17] = [
        ContextKey::Workflow,
        ContextKey::TempPath,
        ContextKey::SourcePaths,
        ContextKey::TargetPath,
        ContextKey::OutputPath,
        ContextKey::TrimFrameStart,
        ContextKey::TrimFrameEnd,
        ContextKey::TempFrameFormat,
        ContextKey::OutputImageQuality,
        ContextKey::OutputImageScale,
        ContextKey::OutputVideoQuality,
        ContextKey::OutputVideoScale,
        ContextKey::OutputVideoFps,
        ContextKey::OutputAudioVolume,
        ContextKey::ExecutionProviders,
        ContextKey::ExecutionDeviceIds,
        ContextKey::ExecutionThreadCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContextKey::Workflow => "workflow",
            ContextKey::TempPath => "temp_path",
            ContextKey::SourcePaths => "source_paths",
            ContextKey::TargetPath => "target_path",
            ContextKey::OutputPath => "output_path",
            ContextKey::TrimFrameStart => "trim_frame_start",
            ContextKey::TrimFrameEnd => "trim_frame_end",
            ContextKey::TempFrameFormat => "temp_frame_format",
            ContextKey::OutputImageQuality => "output_image_quality",
            ContextKey::OutputImageScale => "output_image_scale",
            ContextKey::OutputVideoQuality => "output_video_quality",
            ContextKey::OutputVideoScale => "output_video_scale",
            ContextKey::OutputVideoFps => "output_video_fps",
            ContextKey::OutputAudioVolume => "output_audio_volume",
            ContextKey::ExecutionProviders => "execution_providers",
            ContextKey::ExecutionDeviceIds => "execution_device_ids",
            ContextKey::ExecutionThreadCount => "execution_thread_count",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            ContextKey::Workflow => ValueKind::Workflow,
            ContextKey::TempPath | ContextKey::TargetPath | ContextKey::OutputPath => {
                ValueKind::Path
            }
            ContextKey::SourcePaths => ValueKind::Paths,
            ContextKey::TrimFrameStart
            | ContextKey::TrimFrameEnd
            | ContextKey::OutputImageQuality
            | ContextKey::OutputVideoQuality
            | ContextKey::OutputAudioVolume
            | ContextKey::ExecutionThreadCount => ValueKind::Integer,
            ContextKey::OutputImageScale
            | ContextKey::OutputVideoScale
            | ContextKey::OutputVideoFps => ValueKind::Float,
            ContextKey::TempFrameFormat => ValueKind::Text,
            ContextKey::ExecutionProviders | ContextKey::ExecutionDeviceIds => ValueKind::List,
        }
    }

    /// Whether remote clients may set this key on their session.
    ///
    /// Paths are owned by the server (uploads and scratch files) and
    /// execution settings are process-level.
    pub fn is_api_settable(self) -> bool {
        !matches!(
            self,
            ContextKey::Workflow
                | ContextKey::TempPath
                | ContextKey::SourcePaths
                | ContextKey::TargetPath
                | ContextKey::OutputPath
                | ContextKey::ExecutionProviders
                | ContextKey::ExecutionDeviceIds
                | ContextKey::ExecutionThreadCount
        )
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContextKey {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContextKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ContextError::UnknownKey(s.to_string()))
    }
}

/// A value stored in the job context
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
    Workflow(WorkflowKind),
    Path(PathBuf),
    Paths(Vec<PathBuf>),
    Integer(u32),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl ContextValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ContextValue::Workflow(_) => ValueKind::Workflow,
            ContextValue::Path(_) => ValueKind::Path,
            ContextValue::Paths(_) => ValueKind::Paths,
            ContextValue::Integer(_) => ValueKind::Integer,
            ContextValue::Float(_) => ValueKind::Float,
            ContextValue::Text(_) => ValueKind::Text,
            ContextValue::List(_) => ValueKind::List,
        }
    }

    /// Converts a JSON value into the kind expected by `key`
    pub fn from_json(key: ContextKey, value: &JsonValue) -> Result<Self, ContextError> {
        let invalid = |reason: &str| ContextError::InvalidValue {
            key,
            reason: reason.to_string(),
        };

        match key.kind() {
            ValueKind::Workflow => {
                let name = value.as_str().ok_or_else(|| invalid("expected a string"))?;
                let kind = name.parse::<WorkflowKind>().map_err(|e| invalid(&e))?;
                Ok(ContextValue::Workflow(kind))
            }
            ValueKind::Path => {
                let path = value.as_str().ok_or_else(|| invalid("expected a string"))?;
                Ok(ContextValue::Path(PathBuf::from(path)))
            }
            ValueKind::Paths => Ok(ContextValue::Paths(
                string_array(value)
                    .ok_or_else(|| invalid("expected an array of strings"))?
                    .into_iter()
                    .map(PathBuf::from)
                    .collect(),
            )),
            ValueKind::Integer => {
                let number = value
                    .as_u64()
                    .ok_or_else(|| invalid("expected a non-negative integer"))?;
                let number = u32::try_from(number).map_err(|_| invalid("integer out of range"))?;
                Ok(ContextValue::Integer(number))
            }
            ValueKind::Float => {
                let number = value.as_f64().ok_or_else(|| invalid("expected a number"))?;
                if !number.is_finite() || number <= 0.0 {
                    return Err(invalid("expected a positive number"));
                }
                Ok(ContextValue::Float(number))
            }
            ValueKind::Text => {
                let text = value.as_str().ok_or_else(|| invalid("expected a string"))?;
                if key == ContextKey::TempFrameFormat {
                    let format = text.to_ascii_lowercase();
                    if !is_temp_frame_format(&format) {
                        return Err(invalid(&format!(
                            "expected one of {}",
                            TEMP_FRAME_FORMATS.join(", ")
                        )));
                    }
                    return Ok(ContextValue::Text(format));
                }
                Ok(ContextValue::Text(text.to_string()))
            }
            ValueKind::List => Ok(ContextValue::List(
                string_array(value).ok_or_else(|| invalid("expected an array of strings"))?,
            )),
        }
    }
}

fn string_array(value: &JsonValue) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

/// Errors raised when reading or writing the job context by key
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    #[error("unknown context key: {0}")]
    UnknownKey(String),

    #[error("key {key} expects a {expected} value, got {actual}")]
    TypeMismatch {
        key: ContextKey,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: ContextKey, reason: String },
}
