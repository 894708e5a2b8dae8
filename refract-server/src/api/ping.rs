//! Ping WebSocket Handler
//!
//! `GET /ping` keeps a session alive for as long as the socket is open.
//! The session is named by the `session.<id>` subprotocol.

use axum::{
    extract::{State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::protocol::{PROTOCOL_PREFIX, offered_session};
use crate::service::monitor;
use crate::service::processing::{LoopExit, WebSocketChannel};
use crate::state::AppState;

/// GET /ping
pub async fn ping(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let (protocol, id) = offered_session(&headers).ok_or_else(|| {
        ApiError::BadRequest(format!("Missing {}<id> subprotocol", PROTOCOL_PREFIX))
    })?;
    let handle = state.sessions.handle(id)?;
    state.sessions.touch(id);

    let sessions = Arc::clone(&state.sessions);

    Ok(ws.protocols([protocol]).on_upgrade(move |socket| async move {
        let mut channel = WebSocketChannel::new(socket);
        let exit = monitor::keep_alive(&mut channel, handle, move || sessions.touch(id)).await;

        match exit {
            LoopExit::Fault(reason) => tracing::warn!("Ping of session {} failed: {}", id, reason),
            exit => tracing::debug!("Ping of session {} ended: {:?}", id, exit),
        }
    }))
}
