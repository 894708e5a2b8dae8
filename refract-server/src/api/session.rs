//! Session API Handlers
//!
//! HTTP endpoints for the session lifecycle and per-session configuration.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use refract_core::domain::session::SessionId;
use refract_core::dto::session::{SessionInfo, UpdateState};
use serde::Serialize;

use crate::api::error::ApiResult;
use crate::state::AppState;

/// POST /session
/// Open a new session with a fresh job context
pub async fn create_session(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<SessionInfo>)> {
    let info = state.sessions.create()?;
    tracing::info!("Created session: {}", info.id);

    Ok((StatusCode::CREATED, Json(info)))
}

/// GET /session/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> ApiResult<Json<SessionInfo>> {
    tracing::debug!("Getting session: {}", id);

    Ok(Json(state.sessions.info(id)?))
}

/// DELETE /session/{id}
/// Stop any run, delete the session's files and forget its context
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> ApiResult<StatusCode> {
    state.sessions.destroy(id)?;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /session/{id}/state
/// Apply configuration keys to the session's context; 409 while a run holds it
pub async fn update_state(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(req): Json<UpdateState>,
) -> ApiResult<StatusCode> {
    tracing::debug!("Updating {} keys of session {}", req.values.len(), id);

    state.sessions.update_state(id, &req.values)?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopping: bool,
}

/// POST /session/{id}/stop
/// Ask the session's current run to stop
pub async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> ApiResult<Json<StopResponse>> {
    let stopping = state.sessions.request_stop(id)?;

    Ok(Json(StopResponse { stopping }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ApiError;
    use crate::api::tests::test_state;
    use refract_core::domain::lifecycle::LifecycleState;
    use serde_json::json;
    use tempfile::TempDir;

    fn update(values: serde_json::Value) -> Json<UpdateState> {
        Json(serde_json::from_value(values).unwrap())
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let (status, Json(created)) = create_session(State(state.clone())).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.state, LifecycleState::Idle);

        let Json(fetched) = get_session(State(state.clone()), Path(created.id))
            .await
            .unwrap();
        assert_eq!(fetched.id, created.id);

        let status = delete_session(State(state.clone()), Path(created.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let missing = get_session(State(state), Path(created.id)).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_state() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let (_, Json(session)) = create_session(State(state.clone())).await.unwrap();

        let status = update_state(
            State(state.clone()),
            Path(session.id),
            update(json!({ "trim_frame_start": 3 })),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let handle = state.sessions.handle(session.id).unwrap();
        assert_eq!(handle.context.lock().unwrap().trim_frame_start, Some(3));

        let rejected = update_state(
            State(state.clone()),
            Path(session.id),
            update(json!({ "no_such_key": 1 })),
        )
        .await;
        assert!(matches!(rejected, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_update_state_conflicts_while_busy() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let (_, Json(session)) = create_session(State(state.clone())).await.unwrap();

        let handle = state.sessions.handle(session.id).unwrap();
        let _running = handle.context.lock().unwrap();

        let result = update_state(
            State(state.clone()),
            Path(session.id),
            update(json!({ "trim_frame_start": 3 })),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_stop_session() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let (_, Json(session)) = create_session(State(state.clone())).await.unwrap();

        let Json(idle) = stop_session(State(state.clone()), Path(session.id))
            .await
            .unwrap();
        assert!(!idle.stopping);

        let handle = state.sessions.handle(session.id).unwrap();
        handle.lifecycle.start().unwrap();
        let Json(running) = stop_session(State(state), Path(session.id))
            .await
            .unwrap();
        assert!(running.stopping);
        assert!(handle.lifecycle.is_stopping());
    }
}
