mod api;
mod core;
mod runtime;

pub use self::core::ScriptEngine;
