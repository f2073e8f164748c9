use rhai::FnPtr;
use std::fmt;
use std::rc::Rc;

use crate::task::error::TaskResult;
use crate::task::invocation::TaskInvocation;

/// A task body implemented in Rust.
///
/// Closures of the shape `Fn(&mut TaskInvocation<'_>) -> TaskResult` implement
/// this trait directly.
pub trait TaskBody {
    fn invoke(&self, invocation: &mut TaskInvocation<'_>) -> TaskResult;
}

impl<F> TaskBody for F
where
    F: Fn(&mut TaskInvocation<'_>) -> TaskResult,
{
    fn invoke(&self, invocation: &mut TaskInvocation<'_>) -> TaskResult {
        self(invocation)
    }
}

#[derive(Clone)]
pub enum TaskAction {
    /// Closure registered through `actions()` in a script.
    Script(FnPtr),
    Native(Rc<dyn TaskBody>),
}

impl fmt::Debug for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(func) => f.debug_tuple("Script").field(&func.fn_name()).finish(),
            Self::Native(_) => f.write_str("Native(..)"),
        }
    }
}
