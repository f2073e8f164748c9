use rhai::{Array, EvalAltResult, ImmutableString, Map, NativeCallContext, Position};
use rhai_process::PipelineExecutor;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use super::core::{actions_only_error, ExecutionState};
use crate::logger::{debug, error};
use crate::task::{context_error, BuildStack, Done, TaskFailure, TaskRegistry, TaskShape};

pub(super) type RegistryRef = Arc<Mutex<TaskRegistry>>;
pub(super) type BuildStackRef = Arc<Mutex<BuildStack>>;

#[derive(Clone)]
pub(super) struct RuntimeHandle {
    pub(super) registry: RegistryRef,
    pub(super) exec_state: Arc<Mutex<ExecutionState>>,
    pub(super) build_stack: BuildStackRef,
}

impl RuntimeHandle {
    pub(super) fn new(
        registry: RegistryRef,
        exec_state: Arc<Mutex<ExecutionState>>,
        build_stack: BuildStackRef,
    ) -> Self {
        Self {
            registry,
            exec_state,
            build_stack,
        }
    }
}

pub(super) fn runtime_from_ctx(
    ctx: &NativeCallContext,
) -> Result<RuntimeHandle, Box<EvalAltResult>> {
    ctx.tag()
        .and_then(|tag| tag.read_lock::<RuntimeHandle>())
        .map(|handle| handle.clone())
        .ok_or_else(|| {
            EvalAltResult::ErrorRuntime(
                "Pipewright runtime context is not available.".into(),
                Position::NONE,
            )
            .into()
        })
}

pub(super) fn ensure_actions_scope(
    state: &Arc<Mutex<ExecutionState>>,
    label: &str,
) -> Result<(), Box<EvalAltResult>> {
    let guard = state.lock().unwrap();
    if !guard.is_active() {
        return Err(actions_only_error(label));
    }
    Ok(())
}

pub(super) fn with_build_stack<F, R>(
    ctx: &NativeCallContext,
    op: F,
) -> Result<R, Box<EvalAltResult>>
where
    F: FnOnce(&mut BuildStack) -> Result<R, Box<EvalAltResult>>,
{
    let runtime = runtime_from_ctx(ctx)?;
    let mut stack = runtime.build_stack.lock().unwrap();
    op(&mut stack)
}

/// Runs `op` against the registry for a top-level declaration such as `alias()`.
pub(super) fn with_root_registry<F, R>(
    ctx: &NativeCallContext,
    label: &str,
    op: F,
) -> Result<R, Box<EvalAltResult>>
where
    F: FnOnce(&mut TaskRegistry) -> Result<R, Box<EvalAltResult>>,
{
    let runtime = runtime_from_ctx(ctx)?;
    runtime.build_stack.lock().unwrap().ensure_root(label)?;
    let mut registry = runtime.registry.lock().unwrap();
    op(&mut registry)
}

pub(super) fn array_to_steps(alias: &str, steps: Array) -> Result<Vec<String>, Box<EvalAltResult>> {
    steps
        .into_iter()
        .map(|value| {
            let type_name = value.type_name();
            value.into_string().map_err(|_| {
                context_error(format!(
                    "alias('{}'): steps must be strings, got {}.",
                    alias, type_name
                ))
            })
        })
        .collect()
}

pub(super) fn map_string(
    map: &Map,
    key: &str,
    label: &str,
) -> Result<Option<String>, Box<EvalAltResult>> {
    match map.get(key) {
        None => Ok(None),
        Some(value) if value.is_unit() => Ok(None),
        Some(value) => value
            .clone()
            .try_cast::<ImmutableString>()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| {
                context_error(format!(
                    "{}: '{}' must be a string, got {}.",
                    label,
                    key,
                    value.type_name()
                ))
            }),
    }
}

/// Runs `executor` on a background thread and signals `done` with its outcome.
pub(super) fn spawn_executor(done: Done, executor: PipelineExecutor) {
    debug!("exec_async: starting background process pipeline");
    thread::spawn(move || {
        let outcome = match executor.run() {
            Ok(result) => {
                forward_streams(&result);
                Ok(())
            }
            Err(err) => {
                error!("exec_async: {}", err);
                Err(TaskFailure::message(err.to_string()))
            }
        };
        done.signal(outcome);
    });
}

/// Echoes captured output of a finished process pipeline.
pub(super) fn forward_streams(result: &Map) {
    if let Some(stdout) = extract_string(result, "stdout") {
        if !stdout.is_empty() {
            print!("{}", stdout);
            let _ = io::stdout().flush();
        }
    }
    if let Some(stderr) = extract_string(result, "stderr") {
        if !stderr.is_empty() {
            eprint!("{}", stderr);
            let _ = io::stderr().flush();
        }
    }
}

fn extract_string(map: &Map, key: &str) -> Option<String> {
    map.get(key)
        .and_then(|value| value.clone().try_cast::<ImmutableString>().map(Into::into))
}

pub(super) struct ScopeGuard {
    registry: RegistryRef,
    build_stack: BuildStackRef,
    label: String,
    active: bool,
}

impl ScopeGuard {
    pub(super) fn enter(
        ctx: &NativeCallContext,
        identifier: &str,
        shape: TaskShape,
    ) -> Result<Self, Box<EvalAltResult>> {
        let runtime = runtime_from_ctx(ctx)?;
        {
            let mut stack = runtime.build_stack.lock().unwrap();
            let registry = runtime.registry.lock().unwrap();
            stack.begin_task(&registry, identifier, shape)?;
        }
        Ok(Self {
            registry: runtime.registry.clone(),
            build_stack: runtime.build_stack.clone(),
            label: identifier.to_string(),
            active: true,
        })
    }

    /// Closes the block and registers the task, reporting registration errors.
    pub(super) fn finish(mut self) -> Result<(), Box<EvalAltResult>> {
        self.active = false;
        let mut stack = self.build_stack.lock().unwrap();
        let mut registry = self.registry.lock().unwrap();
        stack.end_task(&mut registry)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let mut stack = match self.build_stack.lock() {
            Ok(guard) => guard,
            Err(err) => {
                error!(
                    "ScopeGuard: failed to lock build stack while ending '{}': {}",
                    self.label, err
                );
                return;
            }
        };
        let mut registry = match self.registry.lock() {
            Ok(guard) => guard,
            Err(err) => {
                error!(
                    "ScopeGuard: failed to lock registry while ending '{}': {}",
                    self.label, err
                );
                return;
            }
        };

        if let Err(err) = stack.end_task(&mut registry) {
            error!("ScopeGuard: failed to close task '{}': {}", self.label, err);
        }
    }
}
