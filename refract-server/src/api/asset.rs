//! Asset API Handlers
//!
//! Upload, list, look up and delete the files a session processes against.
//! Uploads are raw request bodies; role and format travel in the query.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use refract_core::domain::asset::AssetRole;
use refract_core::domain::session::SessionId;
use refract_core::dto::asset::{AssetInfo, DeleteAssets};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub role: AssetRole,
    /// File extension, e.g. `png` or `wav`
    pub format: String,
}

/// POST /session/{id}/assets?role=source|target&format=...
pub async fn upload_asset(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<AssetInfo>)> {
    tracing::info!(
        "Uploading {} byte {} asset to session {}",
        body.len(),
        params.role,
        id
    );

    let sessions = state.sessions.clone();
    let asset = tokio::task::spawn_blocking(move || {
        sessions.add_asset(id, params.role, &params.format, &body)
    })
    .await
    .map_err(|e| ApiError::InternalError(e.to_string()))??;

    Ok((StatusCode::CREATED, Json(AssetInfo::from(&asset))))
}

/// GET /session/{id}/assets
pub async fn list_assets(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> ApiResult<Json<Vec<AssetInfo>>> {
    Ok(Json(state.sessions.list_assets(id)?))
}

/// GET /session/{id}/assets/{asset_id}
pub async fn get_asset(
    State(state): State<AppState>,
    Path((id, asset_id)): Path<(SessionId, Uuid)>,
) -> ApiResult<Json<AssetInfo>> {
    Ok(Json(state.sessions.get_asset(id, asset_id)?))
}

#[derive(Debug, Serialize)]
pub struct DeleteAssetsResponse {
    pub deleted: usize,
}

/// DELETE /session/{id}/assets
pub async fn delete_assets(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<DeleteAssets>,
) -> ApiResult<Json<DeleteAssetsResponse>> {
    let deleted = state.sessions.delete_assets(id, &req.asset_ids)?;

    Ok(Json(DeleteAssetsResponse { deleted }))
}
