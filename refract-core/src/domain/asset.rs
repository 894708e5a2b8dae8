//! Asset domain types
//!
//! An asset is a file uploaded into a session: either source material
//! (faces, audio) or a target to be processed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::session::SessionId;

/// Role an asset plays in a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetRole {
    Source,
    Target,
}

impl std::fmt::Display for AssetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetRole::Source => write!(f, "source"),
            AssetRole::Target => write!(f, "target"),
        }
    }
}

impl FromStr for AssetRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(AssetRole::Source),
            "target" => Ok(AssetRole::Target),
            other => Err(format!("Unknown asset role: {}", other)),
        }
    }
}

/// A file owned by a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHandle {
    pub id: Uuid,
    pub session_id: SessionId,
    pub role: AssetRole,
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl AssetHandle {
    pub fn new(session_id: SessionId, role: AssetRole, path: PathBuf, size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            path,
            size,
            created_at: Utc::now(),
        }
    }
}
