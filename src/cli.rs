use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = "pipewright",
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
pub struct Cli {
    /// Path to the Rhai script file (defaults to searching for pipewright.rhai)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub file: Option<String>,

    /// Environment binding visible to derived targets, overriding the process environment
    #[arg(
        short = 'e',
        long = "env",
        value_name = "KEY=VALUE",
        value_parser = parse_key_val,
        global = true
    )]
    pub env: Vec<(String, String)>,

    /// Fail when the script defines the same name twice
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show tasks, targets and aliases (`pipewright list -h` for details)
    List(ListOptions),
    /// Run tasks and aliases in order (`pipewright run -h` for details)
    Run(RunOptions),
    /// Resolve every alias and multi-task without running anything
    Check,
    /// Print a shell completion script
    Completions(CompletionsOptions),
    /// Internal helper for shell completions
    #[command(name = "complete-tasks", hide = true)]
    CompleteTasks(CompleteTasksOptions),
    /// Run tasks directly (shorthand for `pipewright run <name>...`)
    #[command(external_subcommand)]
    Direct(Vec<String>),
}

#[derive(Args, Debug)]
pub struct ListOptions {
    /// Task or alias to display (omit to show everything)
    #[arg(name = "NAME")]
    pub name: Option<String>,

    /// Print invocable names one per line (good for piping into fzf)
    #[arg(short = 'F', long = "flat")]
    pub flat: bool,
}

#[derive(Args, Debug)]
pub struct RunOptions {
    /// Tasks, `task:target` pairs or aliases, executed in order
    #[arg(name = "NAME", required = true)]
    pub names: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CompletionsOptions {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[derive(Args, Debug)]
pub struct CompleteTasksOptions {
    /// Only print names starting with this prefix
    pub prefix: Option<String>,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing variable name in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}
