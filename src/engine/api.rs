use rhai::packages::Package;
use rhai::{plugin::*, Array, Engine, EvalAltResult, FnPtr, Map, NativeCallContext};
use rhai_process::{Config, PipelineExecutor, ProcessPackage};

use super::runtime::{
    array_to_steps, ensure_actions_scope, forward_streams, map_string, runtime_from_ctx,
    spawn_executor, with_build_stack, with_root_registry, RuntimeHandle, ScopeGuard,
};
use crate::task::{context_error, Alias, DerivedTarget, TaskFailure, TaskShape};

/// Makes the script API and the process helpers available to `engine`.
///
/// `runtime` becomes the engine's default tag; every API function reaches the
/// registry and build stack through it.
pub(super) fn install(engine: &mut Engine, runtime: RuntimeHandle) {
    engine.set_default_tag(Dynamic::from(runtime));
    ProcessPackage::new(Config::default()).register_into_engine(engine);
    engine.register_global_module(exported_module!(pipewright_api).into());
}

#[export_module]
pub mod pipewright_api {
    use super::*;

    pub type Done = crate::task::Done;

    #[rhai_fn(global, name = "task", return_raw)]
    pub fn task_block(
        ctx: NativeCallContext,
        identifier: &str,
        func: FnPtr,
    ) -> Result<(), Box<EvalAltResult>> {
        let guard = ScopeGuard::enter(&ctx, identifier, TaskShape::Simple)?;
        let _ = func.call_within_context::<Dynamic>(&ctx, ())?;
        guard.finish()
    }

    #[rhai_fn(global, name = "multi_task", return_raw)]
    pub fn multi_task_block(
        ctx: NativeCallContext,
        identifier: &str,
        func: FnPtr,
    ) -> Result<(), Box<EvalAltResult>> {
        let guard = ScopeGuard::enter(&ctx, identifier, TaskShape::Multi)?;
        let _ = func.call_within_context::<Dynamic>(&ctx, ())?;
        guard.finish()
    }

    #[rhai_fn(global, name = "target", return_raw)]
    pub fn add_target(
        ctx: NativeCallContext,
        name: &str,
        config: Map,
    ) -> Result<(), Box<EvalAltResult>> {
        with_build_stack(&ctx, move |stack| stack.add_target(name, config))
    }

    #[rhai_fn(global, name = "actions", return_raw)]
    pub fn register_actions(ctx: NativeCallContext, func: FnPtr) -> Result<(), Box<EvalAltResult>> {
        with_build_stack(&ctx, move |stack| stack.set_actions(func))
    }

    #[rhai_fn(global, name = "description", return_raw)]
    pub fn set_description(ctx: NativeCallContext, desc: &str) -> Result<(), Box<EvalAltResult>> {
        with_build_stack(&ctx, |stack| stack.set_description(desc))
    }

    #[rhai_fn(global, name = "alias", return_raw)]
    pub fn register_alias(
        ctx: NativeCallContext,
        name: &str,
        steps: Array,
    ) -> Result<(), Box<EvalAltResult>> {
        let steps = array_to_steps(name, steps)?;
        with_root_registry(&ctx, "alias()", |registry| {
            registry
                .insert_alias(name, Alias::new(steps))
                .map_err(|err| err.into_eval_error())
        })
    }

    #[rhai_fn(global, name = "alias", return_raw)]
    pub fn register_alias_with_description(
        ctx: NativeCallContext,
        name: &str,
        description: &str,
        steps: Array,
    ) -> Result<(), Box<EvalAltResult>> {
        let mut alias = Alias::new(array_to_steps(name, steps)?);
        alias.description = Some(description.to_string());
        with_root_registry(&ctx, "alias()", |registry| {
            registry
                .insert_alias(name, alias)
                .map_err(|err| err.into_eval_error())
        })
    }

    #[rhai_fn(global, name = "derived_target", return_raw)]
    pub fn register_derived_target(
        ctx: NativeCallContext,
        task: &str,
        name: &str,
        binding: &str,
        fallback: &str,
    ) -> Result<(), Box<EvalAltResult>> {
        let derived = DerivedTarget::new(binding, fallback);
        with_root_registry(&ctx, "derived_target()", |registry| {
            registry
                .register_derived_target(task, name, derived)
                .map_err(|err| err.into_eval_error())
        })
    }

    #[rhai_fn(global, name = "derived_target", return_raw)]
    pub fn register_derived_target_with_options(
        ctx: NativeCallContext,
        task: &str,
        name: &str,
        options: Map,
    ) -> Result<(), Box<EvalAltResult>> {
        let label = "derived_target()";
        let binding = map_string(&options, "env", label)?
            .ok_or_else(|| context_error("derived_target() requires an 'env' entry."))?;
        let fallback = map_string(&options, "fallback", label)?
            .ok_or_else(|| context_error("derived_target() requires a 'fallback' entry."))?;
        let prefix = map_string(&options, "prefix", label)?.unwrap_or_default();
        let derived = DerivedTarget::new(binding, fallback).with_prefix(prefix);
        with_root_registry(&ctx, label, |registry| {
            registry
                .register_derived_target(task, name, derived)
                .map_err(|err| err.into_eval_error())
        })
    }

    #[rhai_fn(global, name = "default_task", return_raw)]
    pub fn register_default_task(
        ctx: NativeCallContext,
        name: &str,
    ) -> Result<(), Box<EvalAltResult>> {
        with_root_registry(&ctx, "default_task()", |registry| {
            registry.set_default_task(name)
        })
    }

    #[rhai_fn(global, name = "async_done", return_raw)]
    pub fn async_done(ctx: NativeCallContext) -> Result<Done, Box<EvalAltResult>> {
        let runtime = runtime_from_ctx(&ctx)?;
        ensure_actions_scope(&runtime.exec_state, "async_done()")?;
        let done = runtime.exec_state.lock().unwrap().request_async();
        Ok(done)
    }

    #[rhai_fn(global, name = "ok")]
    pub fn done_ok(done: &mut Done) -> bool {
        done.succeed()
    }

    #[rhai_fn(global, name = "fail")]
    pub fn done_fail(done: &mut Done, reason: &str) -> bool {
        done.fail(TaskFailure::message(reason))
    }

    /// Fails with an exit status; `0` is rejected since it means success.
    #[rhai_fn(global, name = "fail", return_raw)]
    pub fn done_fail_with_code(done: &mut Done, code: i64) -> Result<bool, Box<EvalAltResult>> {
        if code == 0 {
            return Err(context_error(
                "fail() needs a non-zero exit status; use ok() to report success.",
            ));
        }
        let code = i32::try_from(code).unwrap_or(i32::MAX);
        Ok(done.fail(TaskFailure::ExitStatus(code)))
    }

    #[rhai_fn(global, name = "exec_async", return_raw)]
    pub fn exec_async(
        ctx: NativeCallContext,
        done: Done,
        executor: PipelineExecutor,
    ) -> Result<(), Box<EvalAltResult>> {
        let runtime = runtime_from_ctx(&ctx)?;
        ensure_actions_scope(&runtime.exec_state, "exec_async()")?;
        spawn_executor(done, executor);
        Ok(())
    }

    #[rhai_fn(global, name = "exec", return_raw)]
    pub fn exec_executor(
        ctx: NativeCallContext,
        executor: PipelineExecutor,
    ) -> Result<Map, Box<EvalAltResult>> {
        run_executor(&ctx, executor, ExecMode::Run)
    }

    #[rhai_fn(global, name = "exec_stream", return_raw)]
    pub fn exec_stream_default(
        ctx: NativeCallContext,
        executor: PipelineExecutor,
    ) -> Result<Map, Box<EvalAltResult>> {
        run_executor(
            &ctx,
            executor,
            ExecMode::Stream {
                stdout: None,
                stderr: None,
            },
        )
    }

    #[rhai_fn(global, name = "exec_stream", return_raw)]
    pub fn exec_stream_stdout(
        ctx: NativeCallContext,
        executor: PipelineExecutor,
        stdout_cb: FnPtr,
    ) -> Result<Map, Box<EvalAltResult>> {
        run_executor(
            &ctx,
            executor,
            ExecMode::Stream {
                stdout: Some(stdout_cb),
                stderr: None,
            },
        )
    }

    #[rhai_fn(global, name = "exec_stream", return_raw)]
    pub fn exec_stream_both(
        ctx: NativeCallContext,
        executor: PipelineExecutor,
        stdout_cb: FnPtr,
        stderr_cb: FnPtr,
    ) -> Result<Map, Box<EvalAltResult>> {
        run_executor(
            &ctx,
            executor,
            ExecMode::Stream {
                stdout: Some(stdout_cb),
                stderr: Some(stderr_cb),
            },
        )
    }
}

enum ExecMode {
    Run,
    Stream {
        stdout: Option<FnPtr>,
        stderr: Option<FnPtr>,
    },
}

/// Synchronous process execution from inside a task body.
fn run_executor(
    ctx: &NativeCallContext,
    executor: PipelineExecutor,
    mode: ExecMode,
) -> Result<Map, Box<EvalAltResult>> {
    let runtime = runtime_from_ctx(ctx)?;
    ensure_actions_scope(&runtime.exec_state, "exec()")?;
    match mode {
        ExecMode::Run => {
            let result = executor.run()?;
            forward_streams(&result);
            Ok(result)
        }
        ExecMode::Stream { stdout, stderr } => executor.run_stream(ctx, stdout, stderr),
    }
}
