use rhai::FnPtr;

use super::env::EnvProvider;
use super::error::{PipelineError, TaskFailure, TaskResult};
use super::invocation::TaskInvocation;
use super::model::TaskAction;
use super::registry::TaskRegistry;
use super::resolver::{ResolvedStep, Resolver};
use crate::logger::{debug, error, info, trace};
use crate::printer;

/// Runs script-defined task bodies on behalf of the executor.
pub trait ScriptHost {
    fn call_script(&self, func: &FnPtr, invocation: &mut TaskInvocation<'_>) -> TaskResult;
}

/// Host for registries that only hold Rust task bodies.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeOnly;

impl ScriptHost for NativeOnly {
    fn call_script(&self, func: &FnPtr, invocation: &mut TaskInvocation<'_>) -> TaskResult {
        Err(TaskFailure::message(format!(
            "'{}' needs a script engine to run '{}'",
            invocation.step(),
            func.fn_name()
        )))
    }
}

/// A fully flattened and resolved sequence of steps.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    steps: Vec<ResolvedStep>,
}

impl Pipeline {
    /// Flattens `names` and resolves every step before anything runs, so
    /// structural errors surface without side effects.
    pub fn plan<S: AsRef<str>>(
        registry: &TaskRegistry,
        env: &dyn EnvProvider,
        names: &[S],
    ) -> Result<Self, PipelineError> {
        let flattened = registry.flatten(names)?;
        let resolver = Resolver::new(registry, env);
        let mut steps = Vec::with_capacity(flattened.len());
        for invocation in &flattened {
            steps.extend(resolver.resolve(invocation)?);
        }
        debug!("planned {} step(s) from {} invocation(s)", steps.len(), flattened.len());
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[ResolvedStep] {
        &self.steps
    }

    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn execute<H: ScriptHost + ?Sized>(
        &self,
        host: &H,
    ) -> Result<PipelineReport, PipelineError> {
        PipelineRun::new(self).drive(host)
    }
}

/// `Pending -> Running(i) -> Succeeded | Failed(i, reason)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Running { step: usize },
    Succeeded,
    Failed { step: usize, reason: TaskFailure },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub completed: Vec<String>,
}

/// One pass over a pipeline. Steps run strictly one after another; the first
/// failure stops the run.
pub struct PipelineRun<'p> {
    pipeline: &'p Pipeline,
    state: PipelineState,
    completed: Vec<String>,
}

impl<'p> PipelineRun<'p> {
    pub fn new(pipeline: &'p Pipeline) -> Self {
        Self {
            pipeline,
            state: PipelineState::Pending,
            completed: Vec::new(),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn drive<H: ScriptHost + ?Sized>(
        &mut self,
        host: &H,
    ) -> Result<PipelineReport, PipelineError> {
        if self.state != PipelineState::Pending {
            return Err(PipelineError::AlreadyFinished);
        }

        for (index, step) in self.pipeline.steps.iter().enumerate() {
            self.state = PipelineState::Running { step: index };
            info!("step {}/{}: {}", index + 1, self.pipeline.len(), step.label);
            printer::info(format!("Running \"{}\" ({}) task", step.label, step.task));

            if let Err(reason) = run_step(step, host) {
                error!("step '{}' failed: {}", step.label, reason);
                self.state = PipelineState::Failed {
                    step: index,
                    reason: reason.clone(),
                };
                return Err(PipelineError::TaskFailed {
                    index,
                    step: step.label.clone(),
                    reason,
                });
            }
            self.completed.push(step.label.clone());
        }

        self.state = PipelineState::Succeeded;
        Ok(PipelineReport {
            completed: self.completed.clone(),
        })
    }
}

fn run_step<H: ScriptHost + ?Sized>(step: &ResolvedStep, host: &H) -> TaskResult {
    let mut invocation = TaskInvocation::new(
        &step.label,
        &step.task,
        step.target.as_deref(),
        step.config.as_ref(),
    );
    let result = match &step.actions {
        TaskAction::Script(func) => host.call_script(func, &mut invocation),
        TaskAction::Native(body) => body.invoke(&mut invocation),
    };
    let gate = invocation.take_gate();
    drop(invocation);
    result?;

    match gate {
        Some(gate) => {
            debug!("'{}' is asynchronous; waiting for completion", step.label);
            let outcome = gate.wait();
            trace!("'{}' completed: {:?}", step.label, outcome);
            outcome
        }
        None => Ok(()),
    }
}
