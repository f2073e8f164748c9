pub mod bash;
pub mod zsh;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

use crate::cli::Cli;

/// Prints the completion script for `shell`; bash and zsh also complete task names.
pub fn print(shell: Shell) {
    let mut cmd = Cli::command().allow_external_subcommands(false);
    let bin_name = cmd.get_name().to_string();
    match shell {
        Shell::Bash => print!("{}", bash::patch(render(shell, &mut cmd, &bin_name))),
        Shell::Zsh => print!("{}", zsh::patch(render(shell, &mut cmd, &bin_name))),
        other => generate(other, &mut cmd, &bin_name, &mut io::stdout()),
    }
}

fn render(shell: Shell, cmd: &mut clap::Command, bin_name: &str) -> String {
    let mut buffer = Vec::new();
    generate(shell, cmd, bin_name, &mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}
