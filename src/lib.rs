#![doc = include_str!("../README.md")]

pub mod cli;
pub mod completions;
pub mod engine;
pub mod logger;
pub mod printer;
pub mod task;

pub use completions::print as print_shell_completions;

use clap::Parser;
use cli::Cli;
use logger::*;
use rhai::{EvalAltResult, Position};
use std::io::{self, Write};
use task::{EnvProvider, LayeredEnv, MapEnv, PipelineError, ProcessEnv};

const DEFAULT_SCRIPT: &str = "pipewright.rhai";

pub fn run() -> Result<(), Box<EvalAltResult>> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

pub fn run_with_cli(cli: Cli) -> Result<(), Box<EvalAltResult>> {
    logger::init();
    info!("start");
    debug!("cli args: {:?}", cli);

    let script_path = cli
        .file
        .clone()
        .unwrap_or_else(|| DEFAULT_SCRIPT.to_string());

    match cli.cmd {
        Some(cli::Commands::Completions(opts)) => {
            print_shell_completions(opts.shell);
            info!("{} end", env!("CARGO_PKG_NAME"));
            Ok(())
        }
        other => {
            let mut script_engine = if cli.strict {
                engine::ScriptEngine::strict()
            } else {
                engine::ScriptEngine::new()
            };
            script_engine.run_script(&script_path).map_err(|err| {
                printer::error(format!("error: {}", err));
                err
            })?;
            let env = LayeredEnv::new(cli.env.into_iter().collect::<MapEnv>(), ProcessEnv);
            dispatcher(other, script_engine, &env)?;
            info!("{} end", env!("CARGO_PKG_NAME"));
            Ok(())
        }
    }
}

fn dispatcher(
    cmd: Option<cli::Commands>,
    engine: engine::ScriptEngine,
    env: &dyn EnvProvider,
) -> Result<(), Box<EvalAltResult>> {
    debug!("dispatching command: {:?}", cmd);
    match cmd {
        Some(cli::Commands::List(opts)) => {
            info!("Listing tasks: name={:?}, flat={}", opts.name, opts.flat);
            engine.list_tasks(opts.name.as_deref(), opts.flat);
            Ok(())
        }
        Some(cli::Commands::Run(opts)) => run_with_logging(&engine, &opts.names, env),
        Some(cli::Commands::Check) => check_with_logging(&engine, env),
        Some(cli::Commands::CompleteTasks(opts)) => {
            print_task_candidates(&engine, opts.prefix.as_deref().unwrap_or_default());
            Ok(())
        }
        Some(cli::Commands::Completions(_)) => unreachable!("handled earlier in run_with_cli"),
        Some(cli::Commands::Direct(raw)) => {
            if raw.is_empty() {
                warn!("Direct command invoked without a task name");
                return Err(missing_task_name_error());
            }
            run_with_logging(&engine, &raw, env)
        }
        None => {
            if let Some(task) = engine.default_task() {
                run_with_logging(&engine, &[task], env)
            } else {
                info!("Listing tasks: name=None, flat=false");
                engine.list_tasks(None, false);
                Ok(())
            }
        }
    }
}

fn run_with_logging(
    engine: &engine::ScriptEngine,
    names: &[String],
    env: &dyn EnvProvider,
) -> Result<(), Box<EvalAltResult>> {
    info!("Executing pipeline {:?}", names);
    match engine.run_pipeline(names, env) {
        Ok(report) => {
            debug!("pipeline finished after {} step(s)", report.completed.len());
            printer::info("");
            printer::info("Done, without errors.");
            Ok(())
        }
        Err(err) => Err(report_failure(err)),
    }
}

fn check_with_logging(
    engine: &engine::ScriptEngine,
    env: &dyn EnvProvider,
) -> Result<(), Box<EvalAltResult>> {
    let problems = engine.check(env);
    if problems.is_empty() {
        printer::info("All aliases and multi-tasks resolve.");
        return Ok(());
    }
    for (name, err) in &problems {
        printer::error(format!("{}: {}", name, err));
    }
    Err(EvalAltResult::ErrorRuntime(
        format!("{} definition(s) failed to resolve.", problems.len()).into(),
        Position::NONE,
    )
    .into())
}

fn report_failure(err: PipelineError) -> Box<EvalAltResult> {
    if err.is_structural() {
        error!("pipeline rejected before execution: {}", err);
    } else {
        error!("failed to execute pipeline: {}", err);
    }
    printer::error(format!("error: {}", err));
    err.into_eval_error()
}

fn missing_task_name_error() -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        "Task name is required when omitting the 'run' subcommand."
            .to_string()
            .into(),
        Position::NONE,
    ))
}

fn print_task_candidates(engine: &engine::ScriptEngine, prefix: &str) {
    let mut entries = engine.invocable_names();

    entries.sort();
    entries.dedup();

    let mut stdout = io::BufWriter::new(io::stdout());
    for name in entries.into_iter().filter(|name| name.starts_with(prefix)) {
        let _ = writeln!(stdout, "{name}");
    }
    let _ = stdout.flush();
}
