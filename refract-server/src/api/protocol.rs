//! WebSocket Subprotocols
//!
//! Clients prove which session they speak for by offering the
//! `session.<id>` subprotocol. The server echoes the accepted protocol back
//! on upgrade.

use axum::http::{HeaderMap, header::SEC_WEBSOCKET_PROTOCOL};
use refract_core::domain::session::SessionId;

pub const PROTOCOL_PREFIX: &str = "session.";

/// Every subprotocol the client offered, in order
pub fn offered_protocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|protocol| !protocol.is_empty())
        .map(str::to_string)
        .collect()
}

/// Finds the offered subprotocol naming `id`
pub fn session_protocol(headers: &HeaderMap, id: SessionId) -> Option<String> {
    let expected = format!("{}{}", PROTOCOL_PREFIX, id);

    offered_protocols(headers)
        .into_iter()
        .find(|protocol| *protocol == expected)
}

/// Finds the first offered subprotocol naming any well-formed session
pub fn offered_session(headers: &HeaderMap) -> Option<(String, SessionId)> {
    offered_protocols(headers).into_iter().find_map(|protocol| {
        let id = protocol.strip_prefix(PROTOCOL_PREFIX)?.parse().ok()?;
        Some((protocol, id))
    })
}
