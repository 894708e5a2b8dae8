//! Processing Service
//!
//! The streaming loop bound to one session. For every binary payload it:
//! 1. Persists the upload to a scratch file
//! 2. Sanitizes it through the transcoder as the first pipeline stage
//! 3. Runs the image-to-image pipeline against the session's context
//! 4. Sends the output bytes back on success, nothing otherwise
//!
//! Payloads are handled strictly one at a time: the reply to one payload is
//! fully sent before the next payload is read. Destroying the session ends
//! the loop with a normal close.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use refract_core::domain::result::ResultCode;
use refract_core::domain::workflow::WorkflowKind;
use refract_runner::service::Transcoder;
use refract_runner::state::lock_recovering;
use refract_runner::{JobContext, PipelineExecutor, SharedContext, compose, run_stages, stage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::service::session::SessionHandle;

/// Close code sent when a session may not process payloads
pub const POLICY_VIOLATION: u16 = 1008;

/// Close code sent when the session was destroyed under the connection
pub const NORMAL_CLOSURE: u16 = 1000;

const PAYLOAD_EXTENSION: &str = "jpg";

/// How a processing loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The peer closed the connection
    Closed,
    /// The session declared no source material
    PolicyViolation,
    /// The session was destroyed
    SessionClosed,
    /// The transport failed
    Fault(String),
}

#[derive(Debug, Error)]
#[error("channel error: {0}")]
pub struct ChannelError(pub String);

/// Bidirectional binary message transport
#[async_trait]
pub trait PayloadChannel: Send {
    /// Waits for the next binary payload; `None` once the peer has closed
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, ChannelError>;

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), ChannelError>;

    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), ChannelError>;
}

/// `PayloadChannel` over an axum WebSocket
pub struct WebSocketChannel {
    socket: WebSocket,
}

impl WebSocketChannel {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl PayloadChannel for WebSocketChannel {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        loop {
            match self.socket.recv().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ChannelError(e.to_string())),
            }
        }
    }

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), ChannelError> {
        self.socket
            .send(Message::Binary(payload.into()))
            .await
            .map_err(|e| ChannelError(e.to_string()))
    }

    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), ChannelError> {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        self.socket
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| ChannelError(e.to_string()))
    }
}

/// The collaborators every session's payloads run through
pub struct PayloadPipeline {
    pub transcoder: Arc<dyn Transcoder>,
    pub executor: Arc<PipelineExecutor>,
}

/// Scratch files of one payload
struct PayloadPaths {
    raw: PathBuf,
    target: PathBuf,
    output: PathBuf,
}

impl PayloadPaths {
    fn new(dir: &Path) -> Self {
        let scratch = || dir.join(format!("{}.{}", Uuid::new_v4(), PAYLOAD_EXTENSION));
        Self {
            raw: scratch(),
            target: scratch(),
            output: scratch(),
        }
    }

    fn remove_all(&self) {
        for path in [&self.raw, &self.target, &self.output] {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Runs the processing loop for `session` until the connection ends
///
/// A session without source material is closed with 1008 before any
/// payload is read. The loop stays attached to the session while it runs.
pub async fn run_session<C: PayloadChannel>(
    channel: &mut C,
    session: SessionHandle,
    pipeline: Arc<PayloadPipeline>,
    on_activity: impl Fn() + Send,
) -> LoopExit {
    if session.closed.is_cancelled() {
        return close_destroyed(channel, &session).await;
    }
    let _attachment = session.attach();

    let context = Arc::clone(&session.context);
    let has_sources = tokio::task::spawn_blocking(move || lock_recovering(&context).has_sources())
        .await
        .unwrap_or(false);

    if !has_sources {
        info!("Session {} has no source material, closing", session.id);
        if let Err(e) = channel.close(POLICY_VIOLATION, "no source material").await {
            debug!("Failed to send close frame: {}", e);
        }
        return LoopExit::PolicyViolation;
    }

    if let Err(e) = tokio::fs::create_dir_all(&session.dir).await {
        error!("Failed to create {}: {}", session.dir.display(), e);
        return LoopExit::Fault(e.to_string());
    }

    info!("Processing loop started for session {}", session.id);

    loop {
        let received = tokio::select! {
            biased;
            _ = session.closed.cancelled() => None,
            received = channel.receive() => Some(received),
        };

        let payload = match received {
            None => return close_destroyed(channel, &session).await,
            Some(Ok(Some(payload))) => payload,
            Some(Ok(None)) => {
                info!("Session {} closed the connection", session.id);
                return LoopExit::Closed;
            }
            Some(Err(e)) => {
                warn!("Receive failed for session {}: {}", session.id, e);
                return LoopExit::Fault(e.to_string());
            }
        };
        on_activity();

        debug!("Received {} byte payload", payload.len());
        let reply = process_payload(&session, &pipeline, payload).await;

        if let Some(bytes) = reply {
            if let Err(e) = channel.send(bytes).await {
                warn!("Send failed for session {}: {}", session.id, e);
                return LoopExit::Fault(e.to_string());
            }
        }
        on_activity();
    }
}

/// Closes the connection of a destroyed session and drops its scratch files
pub(crate) async fn close_destroyed<C: PayloadChannel>(
    channel: &mut C,
    session: &SessionHandle,
) -> LoopExit {
    info!("Session {} was destroyed, closing", session.id);
    if let Err(e) = channel.close(NORMAL_CLOSURE, "session closed").await {
        debug!("Failed to send close frame: {}", e);
    }

    match tokio::fs::remove_dir_all(&session.dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", session.dir.display(), e),
    }
    LoopExit::SessionClosed
}

/// Handles one payload, returning the bytes to send back
async fn process_payload(
    session: &SessionHandle,
    pipeline: &Arc<PayloadPipeline>,
    payload: Vec<u8>,
) -> Option<Vec<u8>> {
    let paths = Arc::new(PayloadPaths::new(&session.dir));

    let job = {
        let paths = Arc::clone(&paths);
        let context = Arc::clone(&session.context);
        let pipeline = Arc::clone(pipeline);
        move || run_payload(&paths, &context, &pipeline, &payload)
    };

    let reply = match tokio::task::spawn_blocking(job).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Pipeline task for session {} failed: {}", session.id, e);
            None
        }
    };

    paths.remove_all();
    reply
}

fn run_payload(
    paths: &PayloadPaths,
    context: &SharedContext,
    pipeline: &PayloadPipeline,
    payload: &[u8],
) -> Option<Vec<u8>> {
    let Some(workflow) = pipeline.executor.catalog().stages(WorkflowKind::ImageToImage) else {
        error!("No pipeline registered for {}", WorkflowKind::ImageToImage);
        return None;
    };

    if let Err(e) = fs::write(&paths.raw, payload) {
        error!("Failed to persist payload: {}", e);
        return None;
    }

    // Sanitizing runs under the session lifecycle so a stop interrupts it
    let sanitize = {
        let transcoder = Arc::clone(&pipeline.transcoder);
        let raw = paths.raw.clone();
        stage("sanitize", move |context: &mut JobContext| {
            let sanitized = match context.target() {
                Some(target) => transcoder.sanitize(&raw, target, context.lifecycle()),
                None => false,
            };
            let _ = fs::remove_file(&raw);
            if sanitized {
                ResultCode::Success
            } else {
                debug!("Payload could not be sanitized, skipping");
                ResultCode::Failure
            }
        })
    };
    let stages = compose(&[&[sanitize], workflow]);

    let result = {
        let mut context = lock_recovering(context);
        context.target_path = Some(paths.target.clone());
        context.output_path = Some(paths.output.clone());
        context.workflow = Some(WorkflowKind::ImageToImage);

        let result = run_stages(&stages, &mut context);
        context.clear_run_paths();
        result
    };
    let _ = fs::remove_file(&paths.target);

    match result {
        Ok(ResultCode::Success) => match fs::read(&paths.output) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!("Failed to read output: {}", e);
                None
            }
        },
        Ok(code) => {
            debug!("Payload dropped: {}", code);
            None
        }
        Err(e) => {
            error!("Pipeline could not run: {}", e);
            None
        }
    }
}
