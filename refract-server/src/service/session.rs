//! Session Service
//!
//! Registry of live network sessions. Each session owns:
//! - Its job context (held by the runner's state store)
//! - A lifecycle handle for stop requests and metrics
//! - Uploaded assets and a scratch directory, deleted with the session
//! - A last-activity timestamp used by the idle sweeper
//! - A closed signal that ends every loop attached to it when it is destroyed

use chrono::{DateTime, Utc};
use refract_core::domain::asset::{AssetHandle, AssetRole};
use refract_core::domain::context::{ContextError, ContextKey, ContextValue};
use refract_core::domain::session::SessionId;
use refract_core::dto::asset::AssetInfo;
use refract_core::dto::capabilities::{AUDIO_FORMATS, IMAGE_FORMATS, VIDEO_FORMATS};
use refract_core::dto::session::SessionInfo;
use refract_runner::state::lock_recovering;
use refract_runner::{LifecycleController, Scope, SharedContext, StateError, StateStore};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Service error type
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("asset {0} not found")]
    AssetNotFound(Uuid),

    #[error("session {0} is busy processing")]
    Busy(SessionId),

    #[error("{0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StateError> for SessionError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::UnknownSession(id) => SessionError::NotFound(id),
            StateError::Busy(Scope::Session(id)) => SessionError::Busy(id),
            StateError::Busy(Scope::Process) => {
                SessionError::Validation("process context is busy".to_string())
            }
            StateError::Context(e) => SessionError::Validation(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// What a processing loop needs to drive one session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub context: SharedContext,
    pub lifecycle: LifecycleController,
    /// Scratch directory for uploads and payloads
    pub dir: PathBuf,
    /// Cancelled when the session is destroyed
    pub closed: CancellationToken,
    loops: Arc<AtomicUsize>,
}

impl SessionHandle {
    /// Marks a connection loop as attached until the returned guard drops
    ///
    /// The idle sweeper never expires a session with an attached loop.
    pub fn attach(&self) -> LoopAttachment {
        self.loops.fetch_add(1, Ordering::AcqRel);
        LoopAttachment {
            loops: Arc::clone(&self.loops),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.loops.load(Ordering::Acquire) > 0
    }
}

/// Keeps a session attached to a connection loop
pub struct LoopAttachment {
    loops: Arc<AtomicUsize>,
}

impl Drop for LoopAttachment {
    fn drop(&mut self) {
        self.loops.fetch_sub(1, Ordering::AcqRel);
    }
}

struct SessionRecord {
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    context: SharedContext,
    lifecycle: LifecycleController,
    assets: Vec<AssetHandle>,
    dir: PathBuf,
    closed: CancellationToken,
    loops: Arc<AtomicUsize>,
}

impl SessionRecord {
    fn info(&self, id: SessionId) -> SessionInfo {
        SessionInfo {
            id,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            state: self.lifecycle.state(),
            asset_count: self.assets.len(),
        }
    }
}

/// Live sessions keyed by id
pub struct SessionRegistry {
    store: StateStore,
    records: RwLock<HashMap<SessionId, SessionRecord>>,
    root: PathBuf,
}

impl SessionRegistry {
    /// Creates a registry whose sessions fork `store`'s process defaults
    ///
    /// # Arguments
    /// * `store` - State store holding the process-wide default context
    /// * `root` - Directory under which each session gets a scratch directory
    pub fn new(store: StateStore, root: PathBuf) -> Self {
        Self {
            store,
            records: RwLock::new(HashMap::new()),
            root,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, SessionRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, SessionRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates a session with a fresh context and scratch directory
    pub fn create(&self) -> Result<SessionInfo> {
        let id = SessionId::new();
        let dir = self.root.join(id.to_string());
        fs::create_dir_all(&dir)?;

        let context = self.store.open_session(id);
        let lifecycle = lock_recovering(&context).lifecycle().clone();
        let now = Utc::now();
        let record = SessionRecord {
            created_at: now,
            last_activity_at: now,
            context,
            lifecycle,
            assets: Vec::new(),
            dir,
            closed: CancellationToken::new(),
            loops: Arc::default(),
        };

        let info = record.info(id);
        self.write().insert(id, record);
        info!("Session {} created", id);
        Ok(info)
    }

    pub fn info(&self, id: SessionId) -> Result<SessionInfo> {
        self.read()
            .get(&id)
            .map(|record| record.info(id))
            .ok_or(SessionError::NotFound(id))
    }

    pub fn exists(&self, id: SessionId) -> bool {
        self.read().contains_key(&id)
    }

    pub fn handle(&self, id: SessionId) -> Result<SessionHandle> {
        self.read()
            .get(&id)
            .map(|record| SessionHandle {
                id,
                context: Arc::clone(&record.context),
                lifecycle: record.lifecycle.clone(),
                dir: record.dir.clone(),
                closed: record.closed.clone(),
                loops: Arc::clone(&record.loops),
            })
            .ok_or(SessionError::NotFound(id))
    }

    /// Records activity on the session
    pub fn touch(&self, id: SessionId) {
        if let Some(record) = self.write().get_mut(&id) {
            record.last_activity_at = Utc::now();
        }
    }

    /// Destroys the session, stopping any run and deleting its files
    pub fn destroy(&self, id: SessionId) -> Result<()> {
        let record = self.write().remove(&id).ok_or(SessionError::NotFound(id))?;

        record.closed.cancel();
        record.lifecycle.request_stop();
        self.store.close_session(id);

        if let Err(e) = fs::remove_dir_all(&record.dir) {
            warn!("Failed to remove {}: {}", record.dir.display(), e);
        }

        info!(
            "Session {} destroyed ({} assets removed)",
            id,
            record.assets.len()
        );
        Ok(())
    }

    /// Applies API-settable keys to the session's context
    ///
    /// All values are validated before any is written.
    pub fn update_state(&self, id: SessionId, values: &HashMap<String, JsonValue>) -> Result<()> {
        if !self.exists(id) {
            return Err(SessionError::NotFound(id));
        }

        let mut parsed = Vec::with_capacity(values.len());
        for (name, value) in values {
            let key: ContextKey = name
                .parse()
                .map_err(|e: ContextError| SessionError::Validation(e.to_string()))?;
            if !key.is_api_settable() {
                return Err(SessionError::Validation(format!(
                    "{} cannot be set through the API",
                    key
                )));
            }
            let value = ContextValue::from_json(key, value)
                .map_err(|e| SessionError::Validation(e.to_string()))?;
            parsed.push((key, value));
        }

        self.store.with_context(Scope::Session(id), |context| {
            for (key, value) in parsed {
                context.set(key, value)?;
            }
            Ok(())
        })?;

        debug!("Updated {} keys of session {}", values.len(), id);
        self.touch(id);
        Ok(())
    }

    /// Requests a stop of the session's current run
    ///
    /// Returns whether a run was processing and is now stopping.
    pub fn request_stop(&self, id: SessionId) -> Result<bool> {
        let lifecycle = self
            .read()
            .get(&id)
            .map(|record| record.lifecycle.clone())
            .ok_or(SessionError::NotFound(id))?;

        let moved = lifecycle.request_stop();
        info!("Stop requested for session {} (stopping: {})", id, moved);
        Ok(moved)
    }

    /// Stores an uploaded file; source assets are appended to `source_paths`
    pub fn add_asset(
        &self,
        id: SessionId,
        role: AssetRole,
        format: &str,
        bytes: &[u8],
    ) -> Result<AssetHandle> {
        let format = format.to_ascii_lowercase();
        if !is_accepted_format(role, &format) {
            return Err(SessionError::Validation(format!(
                "unsupported {} format: {}",
                role, format
            )));
        }
        if bytes.is_empty() {
            return Err(SessionError::Validation("asset is empty".to_string()));
        }

        let dir = self.handle(id)?.dir.join("assets");
        fs::create_dir_all(&dir)?;

        let mut asset = AssetHandle::new(id, role, PathBuf::new(), bytes.len() as u64);
        asset.path = dir.join(format!("{}.{}", asset.id, format));
        fs::write(&asset.path, bytes)?;

        if role == AssetRole::Source {
            let path = asset.path.clone();
            let declared = self.store.with_context(Scope::Session(id), |context| {
                context.source_paths.get_or_insert_with(Vec::new).push(path);
                Ok(())
            });
            if let Err(e) = declared {
                let _ = fs::remove_file(&asset.path);
                return Err(e.into());
            }
        }

        match self.write().get_mut(&id) {
            Some(record) => {
                record.assets.push(asset.clone());
                record.last_activity_at = Utc::now();
            }
            None => {
                let _ = fs::remove_file(&asset.path);
                return Err(SessionError::NotFound(id));
            }
        }

        info!("Stored {} asset {} for session {}", role, asset.id, id);
        Ok(asset)
    }

    pub fn list_assets(&self, id: SessionId) -> Result<Vec<AssetInfo>> {
        self.read()
            .get(&id)
            .map(|record| record.assets.iter().map(AssetInfo::from).collect())
            .ok_or(SessionError::NotFound(id))
    }

    /// Looks up one asset; assets of other sessions are not found
    pub fn get_asset(&self, id: SessionId, asset_id: Uuid) -> Result<AssetInfo> {
        let records = self.read();
        let record = records.get(&id).ok_or(SessionError::NotFound(id))?;

        record
            .assets
            .iter()
            .find(|asset| asset.id == asset_id)
            .map(AssetInfo::from)
            .ok_or(SessionError::AssetNotFound(asset_id))
    }

    /// Deletes the listed assets, returning how many were found
    pub fn delete_assets(&self, id: SessionId, asset_ids: &[Uuid]) -> Result<usize> {
        let doomed: Vec<AssetHandle> = self
            .read()
            .get(&id)
            .ok_or(SessionError::NotFound(id))?
            .assets
            .iter()
            .filter(|asset| asset_ids.contains(&asset.id))
            .cloned()
            .collect();

        let source_paths: Vec<PathBuf> = doomed
            .iter()
            .filter(|asset| asset.role == AssetRole::Source)
            .map(|asset| asset.path.clone())
            .collect();
        if !source_paths.is_empty() {
            self.store.with_context(Scope::Session(id), |context| {
                if let Some(paths) = context.source_paths.as_mut() {
                    paths.retain(|path| !source_paths.contains(path));
                }
                Ok(())
            })?;
        }

        if let Some(record) = self.write().get_mut(&id) {
            record.assets.retain(|asset| !asset_ids.contains(&asset.id));
            record.last_activity_at = Utc::now();
        }

        for asset in &doomed {
            if let Err(e) = fs::remove_file(&asset.path) {
                warn!("Failed to remove asset {}: {}", asset.path.display(), e);
            }
        }

        debug!("Deleted {} assets of session {}", doomed.len(), id);
        Ok(doomed.len())
    }

    pub fn active_count(&self) -> usize {
        self.read().len()
    }

    /// Sessions whose lifecycle is processing or stopping
    pub fn processing_count(&self) -> usize {
        self.read()
            .values()
            .filter(|record| !record.lifecycle.is_idle())
            .count()
    }

    /// Destroys idle sessions without activity for at least `timeout`
    ///
    /// Sessions with a run in flight or an attached connection are never swept.
    pub fn sweep_idle(&self, timeout: Duration) -> Vec<SessionId> {
        let now = Utc::now();
        let expired: Vec<SessionId> = self
            .read()
            .iter()
            .filter(|(_, record)| record.lifecycle.is_idle())
            .filter(|(_, record)| record.loops.load(Ordering::Acquire) == 0)
            .filter(|(_, record)| {
                (now - record.last_activity_at)
                    .to_std()
                    .map(|idle| idle >= timeout)
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if self.destroy(*id).is_ok() {
                info!("Session {} expired", id);
            }
        }
        expired
    }

    /// Starts the background task that expires idle sessions
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        timeout: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = time::interval(interval);

            loop {
                ticker.tick().await;

                let expired = registry.sweep_idle(timeout);
                if !expired.is_empty() {
                    debug!("Swept {} idle sessions", expired.len());
                }
            }
        })
    }
}

fn is_accepted_format(role: AssetRole, format: &str) -> bool {
    let format = if format == "jpg" { "jpeg" } else { format };
    let image = IMAGE_FORMATS.contains(&format);
    match role {
        AssetRole::Source => image || AUDIO_FORMATS.contains(&format),
        AssetRole::Target => image || VIDEO_FORMATS.contains(&format),
    }
}
