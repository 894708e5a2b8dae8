//! Metrics API Handler
//!
//! `GET /metrics` answers with one JSON snapshot, or upgrades to a
//! WebSocket that pushes a snapshot every two seconds.

use axum::{
    Json,
    extract::{State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use refract_core::dto::metrics::Metrics;

use crate::api::protocol::offered_protocols;
use crate::service::monitor::{self, METRICS_PERIOD};
use crate::service::processing::{LoopExit, WebSocketChannel};
use crate::state::AppState;

/// GET /metrics
pub async fn get_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(ws) = ws else {
        return Json(snapshot(&state)).into_response();
    };

    // Any offered protocol is accepted; the stream is not session bound
    ws.protocols(offered_protocols(&headers).into_iter().take(1))
        .on_upgrade(move |socket| async move {
            let mut channel = WebSocketChannel::new(socket);
            let exit =
                monitor::stream_metrics(&mut channel, || snapshot(&state), METRICS_PERIOD).await;

            if let LoopExit::Fault(reason) = exit {
                tracing::debug!("Metrics stream ended: {}", reason);
            }
        })
}

/// Current server activity
pub fn snapshot(state: &AppState) -> Metrics {
    Metrics {
        active_sessions: state.sessions.active_count(),
        processing_sessions: state.sessions.processing_count(),
        execution_devices: state.execution_devices.as_ref().clone(),
    }
}
