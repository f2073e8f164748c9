use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, Position, AST};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::api;
use super::runtime::RuntimeHandle;
use crate::logger::*;
use crate::task::{
    AsyncSlot, BuildStack, Done, EnvProvider, ListRenderMode, Pipeline, PipelineError,
    PipelineReport, RegistryEntry, ScriptHost, TaskFailure, TaskInvocation, TaskRegistry,
    TaskResult,
};

pub struct ScriptEngine {
    pub engine: Engine,
    pub registry: Arc<Mutex<TaskRegistry>>,
    pub ast: Option<AST>,
    pub(crate) exec_state: Arc<Mutex<ExecutionState>>,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::with_registry(TaskRegistry::new())
    }

    /// An engine whose scripts may not register the same name twice.
    pub fn strict() -> Self {
        Self::with_registry(TaskRegistry::strict())
    }

    fn with_registry(registry: TaskRegistry) -> Self {
        let mut engine = Engine::new();
        // Rhai's register_fn requires closures to be Send + Sync, so we use Arc<Mutex<_>>
        // even though access is effectively single-threaded.
        #[allow(clippy::arc_with_non_send_sync)]
        let registry = Arc::new(Mutex::new(registry));
        let exec_state = Arc::new(Mutex::new(ExecutionState::default()));
        let build_stack = Arc::new(Mutex::new(BuildStack::new()));

        engine.set_max_expr_depths(256, 128);

        api::install(
            &mut engine,
            RuntimeHandle::new(registry.clone(), exec_state.clone(), build_stack),
        );

        Self {
            engine,
            registry,
            ast: None,
            exec_state,
        }
    }

    pub fn run_script(&mut self, path: &str) -> Result<(), Box<EvalAltResult>> {
        let script_path = resolve_script_path(path).map_err(|err| -> Box<EvalAltResult> {
            Box::new(EvalAltResult::ErrorRuntime(
                format!("Unable to locate script file '{}': {}", path, err).into(),
                Position::NONE,
            ))
        })?;

        debug!("run_script({})", script_path.display());

        let ast = self.engine.compile_file(script_path)?;
        trace!("run_script: AST compiled successfully");
        self.load_ast(ast)
    }

    /// Evaluates an in-memory script; used by tests and embedders.
    pub fn run_source(&mut self, source: &str) -> Result<(), Box<EvalAltResult>> {
        let ast = self.engine.compile(source)?;
        self.load_ast(ast)
    }

    fn load_ast(&mut self, ast: AST) -> Result<(), Box<EvalAltResult>> {
        self.engine.run_ast(&ast)?;
        trace!("run_script: AST executed successfully");
        self.ast = Some(ast);
        Ok(())
    }

    pub fn list_tasks(&self, name: Option<&str>, flat: bool) {
        let mode = if flat {
            ListRenderMode::Flat
        } else {
            ListRenderMode::Tree
        };
        self.registry.lock().unwrap().list(name, mode);
    }

    pub fn default_task(&self) -> Option<String> {
        self.registry.lock().unwrap().default_task()
    }

    /// Every string `run` accepts, in registration order.
    pub fn invocable_names(&self) -> Vec<String> {
        let registry = self.registry.lock().unwrap();
        registry
            .collect_list_output(None)
            .items
            .into_iter()
            .map(|item| item.full_name)
            .collect()
    }

    /// Freezes the registry and resolves `names` into a pipeline.
    pub fn plan<S: AsRef<str>>(
        &self,
        names: &[S],
        env: &dyn EnvProvider,
    ) -> Result<Pipeline, PipelineError> {
        let mut registry = self.registry.lock().unwrap();
        registry.freeze();
        Pipeline::plan(&registry, env, names)
    }

    pub fn run_pipeline<S: AsRef<str>>(
        &self,
        names: &[S],
        env: &dyn EnvProvider,
    ) -> Result<PipelineReport, PipelineError> {
        let pipeline = self.plan(names, env)?;
        debug!("run_pipeline: {:?}", pipeline.labels());
        pipeline.execute(self)
    }

    /// Plans every alias and multi-task on its own; returns the ones that fail.
    pub fn check(&self, env: &dyn EnvProvider) -> Vec<(String, PipelineError)> {
        let names: Vec<String> = {
            let registry = self.registry.lock().unwrap();
            registry
                .entries_iter()
                .filter(|(_, entry)| match entry {
                    RegistryEntry::Alias(_) => true,
                    RegistryEntry::Task(task) => task.is_multi(),
                })
                .map(|(name, _)| name.clone())
                .collect()
        };

        names
            .into_iter()
            .filter_map(|name| match self.plan(&[name.as_str()], env) {
                Ok(pipeline) => {
                    trace!("check: '{}' plans {} step(s)", name, pipeline.len());
                    None
                }
                Err(err) => Some((name, err)),
            })
            .collect()
    }
}

impl ScriptHost for ScriptEngine {
    fn call_script(&self, func: &FnPtr, invocation: &mut TaskInvocation<'_>) -> TaskResult {
        let ast = self.ast.as_ref().ok_or_else(|| {
            error!("call_script: AST not loaded before executing '{}'", invocation.step());
            TaskFailure::message("AST is not loaded. Run the script first.")
        })?;

        let args = match (invocation.target(), invocation.config()) {
            (Some(target), Some(config)) => vec![
                Dynamic::from(target.to_string()),
                Dynamic::from_map(config.clone()),
            ],
            _ => Vec::new(),
        };
        trace!(
            "call_script: invoking '{}' for '{}' with {} argument(s)",
            func.fn_name(),
            invocation.step(),
            args.len()
        );

        let scope = ActionScope::start(self.exec_state.clone());
        let result = func.call::<Dynamic>(&self.engine, ast, args);
        let is_async = match scope.take_async() {
            Some(slot) => {
                invocation.attach_gate(slot.into_gate());
                true
            }
            None => false,
        };
        drop(scope);

        // Once a body went async, only its handle decides the outcome.
        match result {
            Err(err) => Err(TaskFailure::message(err.to_string())),
            Ok(value) if !is_async && value.as_bool() == Ok(false) => {
                Err(TaskFailure::ReturnedFalse)
            }
            Ok(_) => Ok(()),
        }
    }
}

/// Whether a task body is running, and the async request it made, if any.
#[derive(Default)]
pub(crate) struct ExecutionState {
    depth: usize,
    pending: Option<AsyncSlot>,
}

impl ExecutionState {
    fn enter(&mut self) {
        self.depth += 1;
    }

    fn exit(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
        }
        if self.depth == 0 {
            self.pending = None;
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn request_async(&mut self) -> Done {
        AsyncSlot::request(&mut self.pending)
    }
}

pub(crate) struct ActionScope {
    state: Arc<Mutex<ExecutionState>>,
}

impl ActionScope {
    pub(crate) fn start(state: Arc<Mutex<ExecutionState>>) -> Self {
        let mut guard = state.lock().unwrap();
        guard.enter();
        drop(guard);
        Self { state }
    }

    fn take_async(&self) -> Option<AsyncSlot> {
        self.state.lock().unwrap().pending.take()
    }
}

impl Drop for ActionScope {
    fn drop(&mut self) {
        let mut guard = self.state.lock().unwrap();
        guard.exit();
    }
}

pub(crate) fn actions_only_error(label: &str) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(
        format!("{} can only be used inside actions().", label).into(),
        Position::NONE,
    )
    .into()
}

fn resolve_script_path(path: &str) -> io::Result<PathBuf> {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        if candidate.exists() {
            return Ok(candidate.to_path_buf());
        } else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Absolute path '{}' does not exist", candidate.display()),
            ));
        }
    }

    let mut current = env::current_dir()?;
    loop {
        let joined = current.join(path);
        if joined.exists() {
            return Ok(joined);
        }
        if !current.pop() {
            break;
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!(
            "Could not find '{}' when walking up parent directories",
            path
        ),
    ))
}
