//! Refract Runner
//!
//! The execution engine for media conversion jobs.
//!
//! Architecture:
//! - Lifecycle: per-run state machine tracking processing and cancellation
//! - Context: the typed job context threaded through every stage
//! - State: job contexts scoped per session, with a process-wide fallback
//! - Executor: runs ordered stage lists with fail-fast semantics
//! - Workflow: the catalog mapping workflow kinds to stage lists
//! - Service: collaborator traits (transcoder, analyser, frame processor, devices)
//!
//! Stages are blocking. Async callers run the executor on a blocking thread.

pub mod config;
pub mod context;
pub mod executor;
pub mod lifecycle;
pub mod media;
pub mod service;
pub mod stage;
pub mod state;
pub mod workflow;

pub use config::RunnerConfig;
pub use context::JobContext;
pub use executor::{ExecutionError, PipelineExecutor, run_stages};
pub use lifecycle::LifecycleController;
pub use service::Toolkit;
pub use stage::{Stage, StageRef, stage};
pub use state::{Scope, SharedContext, StateError, StateStore};
pub use workflow::{WorkflowCatalog, compose};
