//! Asset DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::asset::{AssetHandle, AssetRole};

/// Asset summary returned to clients; server paths are not exposed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub id: Uuid,
    pub role: AssetRole,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&AssetHandle> for AssetInfo {
    fn from(asset: &AssetHandle) -> Self {
        Self {
            id: asset.id,
            role: asset.role,
            size: asset.size,
            created_at: asset.created_at,
        }
    }
}

/// Request to delete several assets at once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAssets {
    pub asset_ids: Vec<Uuid>,
}
