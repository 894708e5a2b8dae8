//! Session DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use crate::domain::lifecycle::LifecycleState;
use crate::domain::session::SessionId;

/// Returned when a session is created or inspected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub state: LifecycleState,
    pub asset_count: usize,
}

/// Request to apply configuration keys to a session's job context
///
/// Keys use the snake_case context key names, e.g. `trim_frame_start`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateState {
    #[serde(flatten)]
    pub values: HashMap<String, JsonValue>,
}
