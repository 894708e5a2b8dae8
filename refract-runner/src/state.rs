//! Session state store
//!
//! Holds the job contexts stages read, one per session, plus a single
//! process-wide context used by CLI runs and as the template that new
//! session contexts are forked from.

use refract_core::domain::context::{ContextError, ContextKey, ContextValue};
use refract_core::domain::session::SessionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::JobContext;

/// A job context shared between the store and the run that uses it
pub type SharedContext = Arc<Mutex<JobContext>>;

/// Which context an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The implicit process-wide context
    Process,
    /// The context owned by one session
    Session(SessionId),
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Process => write!(f, "process"),
            Scope::Session(id) => write!(f, "session {}", id),
        }
    }
}

/// State store errors
#[derive(Debug, Error)]
pub enum StateError {
    #[error("session {0} not found")]
    UnknownSession(SessionId),

    /// The context is locked by an in-flight pipeline run
    #[error("{0} is busy processing")]
    Busy(Scope),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Store of job contexts scoped per session
pub struct StateStore {
    process: SharedContext,
    sessions: RwLock<HashMap<SessionId, SharedContext>>,
}

impl StateStore {
    /// Creates a store whose process-wide context holds `defaults`
    pub fn new(defaults: JobContext) -> Self {
        Self {
            process: Arc::new(Mutex::new(defaults)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the session's context, creating it from the process defaults if absent
    pub fn open_session(&self, id: SessionId) -> SharedContext {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = sessions.get(&id) {
            return Arc::clone(existing);
        }

        let context = lock_recovering(&self.process).fork();
        let context = Arc::new(Mutex::new(context));
        sessions.insert(id, Arc::clone(&context));
        debug!("Opened state for session {}", id);
        context
    }

    /// Drops the session's context. Returns whether it existed.
    pub fn close_session(&self, id: SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some();
        if removed {
            debug!("Closed state for session {}", id);
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Resolves a scope to its shared context
    pub fn context(&self, scope: Scope) -> Result<SharedContext, StateError> {
        match scope {
            Scope::Process => Ok(Arc::clone(&self.process)),
            Scope::Session(id) => self
                .sessions
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(&id)
                .cloned()
                .ok_or(StateError::UnknownSession(id)),
        }
    }

    pub fn get(&self, scope: Scope, key: ContextKey) -> Result<Option<ContextValue>, StateError> {
        self.with_context(scope, |context| Ok(context.get(key)))
    }

    pub fn set(
        &self,
        scope: Scope,
        key: ContextKey,
        value: ContextValue,
    ) -> Result<(), StateError> {
        self.with_context(scope, |context| Ok(context.set(key, value)?))
    }

    /// Writes the value only if the key is unset in this scope
    pub fn init_if_absent(
        &self,
        scope: Scope,
        key: ContextKey,
        value: ContextValue,
    ) -> Result<bool, StateError> {
        self.with_context(scope, |context| Ok(context.init_if_absent(key, value)?))
    }

    /// Runs `f` against the scope's context without waiting on an in-flight run
    pub fn with_context<T>(
        &self,
        scope: Scope,
        f: impl FnOnce(&mut JobContext) -> Result<T, StateError>,
    ) -> Result<T, StateError> {
        let shared = self.context(scope)?;
        let mut context = match shared.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("Recovering poisoned context for {}", scope);
                poisoned.into_inner()
            }
            Err(TryLockError::WouldBlock) => return Err(StateError::Busy(scope)),
        };
        f(&mut context)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(JobContext::new())
    }
}

/// Locks a context, recovering from a poisoned lock left by a panicking stage
pub fn lock_recovering(context: &Mutex<JobContext>) -> MutexGuard<'_, JobContext> {
    context.lock().unwrap_or_else(|poisoned| {
        warn!("Recovering poisoned job context");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_values() -> Vec<(ContextKey, ContextValue)> {
        vec![
            (ContextKey::TrimFrameStart, ContextValue::Integer(5)),
            (ContextKey::OutputVideoFps, ContextValue::Float(30.0)),
            (
                ContextKey::TargetPath,
                ContextValue::Path(PathBuf::from("/tmp/a.jpg")),
            ),
            (
                ContextKey::TempFrameFormat,
                ContextValue::Text("jpg".to_string()),
            ),
        ]
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = StateStore::default();
        let first = SessionId::new();
        let second = SessionId::new();
        store.open_session(first);
        store.open_session(second);

        for (key, value) in sample_values() {
            store.set(Scope::Session(first), key, value.clone()).unwrap();
            assert_eq!(store.get(Scope::Session(first), key).unwrap(), Some(value));
            assert_eq!(store.get(Scope::Session(second), key).unwrap(), None);
            assert_eq!(store.get(Scope::Process, key).unwrap(), None);
        }
    }

    #[test]
    fn test_sessions_fork_process_defaults() {
        let store = StateStore::default();
        store
            .set(
                Scope::Process,
                ContextKey::OutputImageQuality,
                ContextValue::Integer(90),
            )
            .unwrap();

        let id = SessionId::new();
        store.open_session(id);
        assert_eq!(
            store.get(Scope::Session(id), ContextKey::OutputImageQuality).unwrap(),
            Some(ContextValue::Integer(90))
        );

        store
            .set(
                Scope::Session(id),
                ContextKey::OutputImageQuality,
                ContextValue::Integer(50),
            )
            .unwrap();
        assert_eq!(
            store.get(Scope::Process, ContextKey::OutputImageQuality).unwrap(),
            Some(ContextValue::Integer(90))
        );
    }

    #[test]
    fn test_open_session_is_idempotent() {
        let store = StateStore::default();
        let id = SessionId::new();
        let first = store.open_session(id);
        let second = store.open_session(id);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_unknown_and_closed_sessions() {
        let store = StateStore::default();
        let id = SessionId::new();
        assert!(matches!(
            store.get(Scope::Session(id), ContextKey::Workflow),
            Err(StateError::UnknownSession(_))
        ));

        store.open_session(id);
        assert!(store.close_session(id));
        assert!(!store.close_session(id));
        assert!(store.context(Scope::Session(id)).is_err());
    }

    #[test]
    fn test_init_if_absent_scoped() {
        let store = StateStore::default();
        let id = SessionId::new();
        store.open_session(id);

        let scope = Scope::Session(id);
        assert!(
            store
                .init_if_absent(scope, ContextKey::OutputVideoFps, ContextValue::Float(24.0))
                .unwrap()
        );
        assert!(
            !store
                .init_if_absent(scope, ContextKey::OutputVideoFps, ContextValue::Float(60.0))
                .unwrap()
        );
        assert_eq!(
            store.get(scope, ContextKey::OutputVideoFps).unwrap(),
            Some(ContextValue::Float(24.0))
        );
    }

    #[test]
    fn test_locked_context_reports_busy() {
        let store = StateStore::default();
        let id = SessionId::new();
        let shared = store.open_session(id);

        let _guard = shared.lock().unwrap();
        assert!(matches!(
            store.set(Scope::Session(id), ContextKey::TrimFrameEnd, ContextValue::Integer(1)),
            Err(StateError::Busy(_))
        ));
    }

    #[test]
    fn test_type_mismatch_surfaces_as_context_error() {
        let store = StateStore::default();
        assert!(matches!(
            store.set(Scope::Process, ContextKey::TrimFrameEnd, ContextValue::Float(1.0)),
            Err(StateError::Context(ContextError::TypeMismatch { .. }))
        ));
    }
}
