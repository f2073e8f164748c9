mod action;
mod alias;
mod task;
mod util;

pub use action::{TaskAction, TaskBody};
pub use alias::{Alias, DerivedTarget};
pub use task::{TargetConfig, Task, TaskKind};
pub(crate) use util::{context_error, split_invocation, validate_name};
