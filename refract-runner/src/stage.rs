//! Pipeline stages
//!
//! A stage is one unit of pipeline work. It reads and writes the job
//! context and reports exactly one `ResultCode`. Stages keep no state of
//! their own between invocations.

use refract_core::domain::result::ResultCode;
use std::sync::Arc;

use crate::context::JobContext;

/// A named unit of pipeline work
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, context: &mut JobContext) -> ResultCode;
}

/// Shared reference to a stage; the same stage may appear in many pipelines
pub type StageRef = Arc<dyn Stage>;

struct FnStage<F> {
    name: String,
    func: F,
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&mut JobContext) -> ResultCode + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, context: &mut JobContext) -> ResultCode {
        (self.func)(context)
    }
}

/// Wraps a function or closure as a stage
pub fn stage<F>(name: impl Into<String>, func: F) -> StageRef
where
    F: Fn(&mut JobContext) -> ResultCode + Send + Sync + 'static,
{
    Arc::new(FnStage {
        name: name.into(),
        func,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_stage() {
        let bump = stage("bump", |context: &mut JobContext| {
            context.trim_frame_start = Some(context.trim_frame_start.unwrap_or(0) + 1);
            ResultCode::Success
        });

        let mut context = JobContext::new();
        assert_eq!(bump.name(), "bump");
        assert_eq!(bump.run(&mut context), ResultCode::Success);
        assert_eq!(bump.run(&mut context), ResultCode::Success);
        assert_eq!(context.trim_frame_start, Some(2));
    }
}
