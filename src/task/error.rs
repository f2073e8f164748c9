use rhai::{EvalAltResult, Position};
use thiserror::Error;

/// Reason a task body reported (or was deemed to report) failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("{0}")]
    Error(String),

    #[error("task body returned false")]
    ReturnedFalse,

    #[error("exited with status {0}")]
    ExitStatus(i32),

    #[error("completion handle was dropped without being signaled")]
    Abandoned,
}

impl TaskFailure {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }
}

pub type TaskResult = Result<(), TaskFailure>;

/// Errors raised while registering, planning or executing a pipeline.
///
/// Everything except [`PipelineError::TaskFailed`] is structural: it points at a
/// configuration bug and is reported before any task body of the plan runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Task '{0}' does not exist.")]
    UnknownTask(String),

    #[error("Task '{task}' has no target named '{target}'.")]
    UnknownTarget { task: String, target: String },

    #[error("Task '{task}' is not a multi-task; target '{target}' cannot be applied.")]
    TargetNotApplicable { task: String, target: String },

    #[error("Cyclic alias reference: {}", .chain.join(" -> "))]
    CyclicAliasReference { chain: Vec<String> },

    #[error("Task '{0}' has no actions() registered.")]
    MissingActions(String),

    #[error("Cannot register '{0}': the registry is frozen while a pipeline runs.")]
    RegistryFrozen(String),

    #[error("'{0}' is already defined.")]
    DuplicateName(String),

    #[error("{0}")]
    InvalidName(String),

    #[error("step {} '{step}' failed: {reason}", .index + 1)]
    TaskFailed {
        index: usize,
        step: String,
        reason: TaskFailure,
    },

    #[error("pipeline has already finished and cannot be resumed")]
    AlreadyFinished,
}

impl PipelineError {
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::TaskFailed { .. } | Self::AlreadyFinished)
    }

    pub fn into_eval_error(self) -> Box<EvalAltResult> {
        EvalAltResult::ErrorRuntime(self.to_string().into(), Position::NONE).into()
    }
}
