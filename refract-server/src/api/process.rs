//! Processing WebSocket Handler
//!
//! Upgrades `GET /session/{id}/process` into the session's processing loop.
//! The client must offer the `session.<id>` subprotocol of the session it drives.

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use refract_core::domain::session::SessionId;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::protocol::{PROTOCOL_PREFIX, session_protocol};
use crate::service::processing_service::{self, LoopExit, WebSocketChannel};
use crate::state::AppState;

/// GET /session/{id}/process
pub async fn process_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let protocol = session_protocol(&headers, id).ok_or_else(|| {
        ApiError::BadRequest(format!("Missing {}{} subprotocol", PROTOCOL_PREFIX, id))
    })?;
    let handle = state.sessions.handle(id)?;

    let pipeline = Arc::clone(&state.pipeline);
    let sessions = Arc::clone(&state.sessions);

    Ok(ws.protocols([protocol]).on_upgrade(move |socket| async move {
        let mut channel = WebSocketChannel::new(socket);
        let exit = processing_service::run_session(&mut channel, handle, pipeline, move || {
            sessions.touch(id)
        })
        .await;

        match exit {
            LoopExit::Fault(reason) => {
                tracing::warn!("Processing loop of session {} failed: {}", id, reason)
            }
            exit => tracing::info!("Processing loop of session {} ended: {:?}", id, exit),
        }
    }))
}
