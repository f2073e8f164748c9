use rhai::Dynamic;

use super::completion::{AsyncSlot, CompletionGate, Done};
use super::model::TargetConfig;

/// What a task body sees while it runs one step.
pub struct TaskInvocation<'a> {
    step: &'a str,
    task: &'a str,
    target: Option<&'a str>,
    config: Option<&'a TargetConfig>,
    pending: Option<AsyncSlot>,
    gate: Option<CompletionGate>,
}

impl<'a> TaskInvocation<'a> {
    pub(crate) fn new(
        step: &'a str,
        task: &'a str,
        target: Option<&'a str>,
        config: Option<&'a TargetConfig>,
    ) -> Self {
        Self {
            step,
            task,
            target,
            config,
            pending: None,
            gate: None,
        }
    }

    /// The invocation label, e.g. `jsx:debug`.
    pub fn step(&self) -> &str {
        self.step
    }

    pub fn task(&self) -> &str {
        self.task
    }

    pub fn target(&self) -> Option<&str> {
        self.target
    }

    pub fn config(&self) -> Option<&TargetConfig> {
        self.config
    }

    pub fn option(&self, key: &str) -> Option<&Dynamic> {
        self.config.and_then(|config| config.get(key))
    }

    /// Switches this step to asynchronous completion.
    ///
    /// The pipeline does not advance until the returned handle (or one of its
    /// clones) is signaled.
    pub fn async_handle(&mut self) -> Done {
        AsyncSlot::request(&mut self.pending)
    }

    pub fn is_async(&self) -> bool {
        self.pending.is_some() || self.gate.is_some()
    }

    pub(crate) fn attach_gate(&mut self, gate: CompletionGate) {
        self.gate = Some(gate);
    }

    pub(crate) fn take_gate(&mut self) -> Option<CompletionGate> {
        self.gate
            .take()
            .or_else(|| self.pending.take().map(AsyncSlot::into_gate))
    }
}
