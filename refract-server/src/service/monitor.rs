//! Monitor Service
//!
//! Long-lived connections that carry no payloads: the metrics stream and
//! the session keep-alive.

use refract_core::dto::metrics::Metrics;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::service::processing::{self, LoopExit, PayloadChannel};
use crate::service::session::SessionHandle;

/// Interval between two metrics pushes
pub const METRICS_PERIOD: Duration = Duration::from_secs(2);

/// Pushes a metrics snapshot as JSON text every `period` until the peer leaves
///
/// Inbound payloads are read and discarded.
pub async fn stream_metrics<C: PayloadChannel>(
    channel: &mut C,
    snapshot: impl Fn() -> Metrics + Send,
    period: Duration,
) -> LoopExit {
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            biased;
            _ = ticker.tick() => {
                let text = match serde_json::to_string(&snapshot()) {
                    Ok(text) => text,
                    Err(e) => return LoopExit::Fault(e.to_string()),
                };
                if let Err(e) = channel.send_text(text).await {
                    debug!("Metrics stream ended: {}", e);
                    return LoopExit::Fault(e.to_string());
                }
            }
            received = channel.receive() => match received {
                Ok(Some(_)) => {}
                Ok(None) => return LoopExit::Closed,
                Err(e) => return LoopExit::Fault(e.to_string()),
            },
        }
    }
}

/// Holds a session open while the client is connected
///
/// Every binary heartbeat counts as activity and is echoed back. The
/// connection is closed when the session is destroyed.
pub async fn keep_alive<C: PayloadChannel>(
    channel: &mut C,
    session: SessionHandle,
    on_activity: impl Fn() + Send,
) -> LoopExit {
    if session.closed.is_cancelled() {
        return processing::close_destroyed(channel, &session).await;
    }
    let _attachment = session.attach();
    info!("Keep-alive started for session {}", session.id);

    loop {
        let received = tokio::select! {
            biased;
            _ = session.closed.cancelled() => None,
            received = channel.receive() => Some(received),
        };

        match received {
            None => return processing::close_destroyed(channel, &session).await,
            Some(Ok(Some(heartbeat))) => {
                on_activity();
                if let Err(e) = channel.send(heartbeat).await {
                    warn!("Heartbeat echo failed for session {}: {}", session.id, e);
                    return LoopExit::Fault(e.to_string());
                }
            }
            Some(Ok(None)) => return LoopExit::Closed,
            Some(Err(e)) => return LoopExit::Fault(e.to_string()),
        }
    }
}
