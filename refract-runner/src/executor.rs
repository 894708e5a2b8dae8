//! Pipeline executor
//!
//! Runs an ordered list of stages against a job context:
//! - Starts the context's lifecycle controller
//! - Invokes stages in order, stopping at the first non-success
//! - Reports `Cancelled` instead of `Failure` when a stop was requested
//! - Ends the controller exactly once on every path, panics included
//!
//! No compensating rollback is performed for stages that already ran;
//! their on-disk output is left to the clear stages and the caller.

use refract_core::domain::lifecycle::LifecycleError;
use refract_core::domain::result::ResultCode;
use refract_core::domain::workflow::WorkflowKind;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::JobContext;
use crate::lifecycle::LifecycleController;
use crate::stage::StageRef;
use crate::workflow::WorkflowCatalog;

/// Errors that prevent a pipeline from running at all
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("no pipeline registered for workflow {0}")]
    UnknownWorkflow(WorkflowKind),

    #[error("job context has no workflow kind")]
    MissingWorkflow,
}

/// Ends the lifecycle when dropped, including during unwinding
struct EndGuard<'a>(&'a LifecycleController);

impl Drop for EndGuard<'_> {
    fn drop(&mut self) {
        self.0.end();
    }
}

/// Executes stage lists from a workflow catalog
pub struct PipelineExecutor {
    catalog: Arc<WorkflowCatalog>,
}

impl PipelineExecutor {
    pub fn new(catalog: Arc<WorkflowCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    /// Runs the pipeline registered for the context's workflow kind
    pub fn run_context(&self, context: &mut JobContext) -> Result<ResultCode, ExecutionError> {
        let kind = context.workflow.ok_or(ExecutionError::MissingWorkflow)?;
        self.run_workflow(kind, context)
    }

    /// Runs the pipeline registered for `kind`
    pub fn run_workflow(
        &self,
        kind: WorkflowKind,
        context: &mut JobContext,
    ) -> Result<ResultCode, ExecutionError> {
        let stages = self
            .catalog
            .stages(kind)
            .ok_or(ExecutionError::UnknownWorkflow(kind))?;

        info!("Running workflow '{}' with {} stages", kind, stages.len());
        Ok(run_stages(stages, context)?)
    }
}

/// Runs `stages` in order against `context`
///
/// If the lifecycle cannot be started no stage runs and the controller is
/// left untouched.
pub fn run_stages(
    stages: &[StageRef],
    context: &mut JobContext,
) -> Result<ResultCode, LifecycleError> {
    let lifecycle = context.lifecycle().clone();
    lifecycle.start()?;
    let _guard = EndGuard(&lifecycle);

    let started_at = Instant::now();

    for (idx, stage) in stages.iter().enumerate() {
        debug!("Executing stage {}/{}: {}", idx + 1, stages.len(), stage.name());

        let code = stage.run(context);
        if code.is_success() {
            continue;
        }

        let code = if code == ResultCode::Failure && lifecycle.is_stopping() {
            ResultCode::Cancelled
        } else {
            code
        };

        match code {
            ResultCode::Cancelled => info!("Stage '{}' cancelled", stage.name()),
            _ => warn!("Stage '{}' finished with {}", stage.name(), code),
        }
        return Ok(code);
    }

    info!(
        "Pipeline completed in {:.2} seconds",
        started_at.elapsed().as_secs_f64()
    );
    Ok(ResultCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::stage;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<String>>>;

    fn recording(name: &str, calls: &Calls, code: ResultCode) -> StageRef {
        let calls = Arc::clone(calls);
        let label = name.to_string();
        stage(name, move |_context: &mut JobContext| {
            calls.lock().unwrap().push(label.clone());
            code
        })
    }

    const IMAGE_TO_IMAGE: [&str; 9] = [
        "analyse",
        "clear",
        "setup",
        "create_frames",
        "process_frames",
        "merge_frames",
        "restore_audio",
        "finalize",
        "clear",
    ];

    fn pipeline(calls: &Calls, overrides: &[(&str, ResultCode)]) -> Vec<StageRef> {
        IMAGE_TO_IMAGE
            .iter()
            .map(|name| {
                let code = overrides
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, code)| *code)
                    .unwrap_or(ResultCode::Success);
                recording(name, calls, code)
            })
            .collect()
    }

    #[test]
    fn test_all_stages_succeed() {
        let calls: Calls = Arc::default();
        let stages = pipeline(&calls, &[]);
        let mut context = JobContext::new();

        let result = run_stages(&stages, &mut context).unwrap();

        assert_eq!(result, ResultCode::Success);
        assert_eq!(*calls.lock().unwrap(), IMAGE_TO_IMAGE.to_vec());
        assert!(context.lifecycle().is_idle());
        assert_eq!(context.lifecycle().completed_runs(), 1);
    }

    #[test]
    fn test_failure_short_circuits() {
        let calls: Calls = Arc::default();
        let stages = pipeline(&calls, &[("create_frames", ResultCode::Failure)]);
        let mut context = JobContext::new();

        let result = run_stages(&stages, &mut context).unwrap();

        assert_eq!(result, ResultCode::Failure);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["analyse", "clear", "setup", "create_frames"]
        );
        assert_eq!(context.lifecycle().completed_runs(), 1);
    }

    #[test]
    fn test_every_failing_position_stops_later_stages() {
        for k in 0..IMAGE_TO_IMAGE.len() {
            let calls: Calls = Arc::default();
            let mut stages = pipeline(&calls, &[]);
            stages[k] = recording(IMAGE_TO_IMAGE[k], &calls, ResultCode::Rejected);
            let mut context = JobContext::new();

            let result = run_stages(&stages, &mut context).unwrap();

            assert_eq!(result, ResultCode::Rejected);
            assert_eq!(calls.lock().unwrap().len(), k + 1);
            assert_eq!(context.lifecycle().completed_runs(), 1);
        }
    }

    #[test]
    fn test_failure_while_stopping_is_cancelled() {
        let calls: Calls = Arc::default();
        let mut stages = pipeline(&calls, &[]);
        stages[3] = stage("create_frames", |context: &mut JobContext| {
            context.lifecycle().request_stop();
            ResultCode::Failure
        });
        let mut context = JobContext::new();

        let result = run_stages(&stages, &mut context).unwrap();

        assert_eq!(result, ResultCode::Cancelled);
        assert_eq!(calls.lock().unwrap().len(), 3);
        assert!(context.lifecycle().is_idle());
    }

    #[test]
    fn test_rejection_is_not_translated_when_stopping() {
        let stages = vec![stage("analyse", |context: &mut JobContext| {
            context.lifecycle().request_stop();
            ResultCode::Rejected
        })];
        let mut context = JobContext::new();

        assert_eq!(
            run_stages(&stages, &mut context).unwrap(),
            ResultCode::Rejected
        );
    }

    #[test]
    fn test_success_while_stopping_continues() {
        let calls: Calls = Arc::default();
        let mut stages = pipeline(&calls, &[]);
        stages[0] = stage("analyse", |context: &mut JobContext| {
            context.lifecycle().request_stop();
            ResultCode::Success
        });
        let mut context = JobContext::new();

        let result = run_stages(&stages, &mut context).unwrap();

        assert_eq!(result, ResultCode::Success);
        assert_eq!(calls.lock().unwrap().len(), IMAGE_TO_IMAGE.len() - 1);
    }

    #[test]
    fn test_stage_observes_processing_state() {
        let stages = vec![stage("check", |context: &mut JobContext| {
            if context.lifecycle().is_processing() {
                ResultCode::Success
            } else {
                ResultCode::Failure
            }
        })];
        let mut context = JobContext::new();
        assert_eq!(
            run_stages(&stages, &mut context).unwrap(),
            ResultCode::Success
        );
    }

    #[test]
    fn test_panicking_stage_still_ends_lifecycle() {
        let stages = vec![stage("boom", |_context: &mut JobContext| -> ResultCode {
            panic!("stage exploded")
        })];
        let mut context = JobContext::new();

        let outcome = catch_unwind(AssertUnwindSafe(|| run_stages(&stages, &mut context)));

        assert!(outcome.is_err());
        assert!(context.lifecycle().is_idle());
        assert_eq!(context.lifecycle().completed_runs(), 1);
    }

    #[test]
    fn test_start_failure_runs_nothing() {
        let calls: Calls = Arc::default();
        let stages = pipeline(&calls, &[]);
        let mut context = JobContext::new();
        context.lifecycle().start().unwrap();

        let err = run_stages(&stages, &mut context).unwrap_err();

        assert!(matches!(err, LifecycleError::InvalidStateTransition { .. }));
        assert!(calls.lock().unwrap().is_empty());
        assert!(context.lifecycle().is_processing());
    }

    #[test]
    fn test_run_context_requires_registered_workflow() {
        let executor = PipelineExecutor::new(Arc::new(WorkflowCatalog::new()));
        let mut context = JobContext::new();

        assert!(matches!(
            executor.run_context(&mut context),
            Err(ExecutionError::MissingWorkflow)
        ));

        context.workflow = Some(WorkflowKind::ImageToImage);
        assert!(matches!(
            executor.run_context(&mut context),
            Err(ExecutionError::UnknownWorkflow(WorkflowKind::ImageToImage))
        ));
        assert_eq!(context.lifecycle().completed_runs(), 0);
    }

    #[test]
    fn test_run_workflow_uses_catalog() {
        let calls: Calls = Arc::default();
        let mut catalog = WorkflowCatalog::new();
        catalog.register(WorkflowKind::ImageToImage, pipeline(&calls, &[]));
        let executor = PipelineExecutor::new(Arc::new(catalog));
        let mut context = JobContext::new();

        let result = executor
            .run_workflow(WorkflowKind::ImageToImage, &mut context)
            .unwrap();

        assert_eq!(result, ResultCode::Success);
        assert_eq!(calls.lock().unwrap().len(), IMAGE_TO_IMAGE.len());
    }
}
