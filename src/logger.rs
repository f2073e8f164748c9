use env_logger::{Builder, Env, Target};
use std::io::Write;

/// Filter variable, e.g. `PIPEWRIGHT_LOG=debug`.
pub const LOG_ENV: &str = "PIPEWRIGHT_LOG";

pub fn init() {
    let default_filter = if cfg!(debug_assertions) { "info" } else { "warn" };
    let env = Env::new()
        .filter_or(LOG_ENV, default_filter)
        .write_style(format!("{}_STYLE", LOG_ENV));

    let mut builder = Builder::from_env(env);

    builder.target(Target::Stderr).format(|buf, record| {
        writeln!(
            buf,
            "[{:>5} {}:{}] {}",
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    if builder.try_init().is_err() {
        log::debug!("logger already initialized");
    }
}

/// Re-export logging macros
#[allow(unused_imports)]
pub use log::{debug, error, info, trace, warn};
