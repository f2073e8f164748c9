mod builder;
mod completion;
mod display;
mod env;
mod error;
mod invocation;
mod model;
mod pipeline;
mod registry;
mod resolver;
mod stack;

pub use completion::{channel as completion_channel, CompletionGate, Done};
pub use display::{
    ListItem, ListItemKind, ListMessage, ListMessageLevel, ListOutput, ListRenderMode,
};
pub use env::{EnvProvider, LayeredEnv, MapEnv, ProcessEnv};
pub use error::{PipelineError, TaskFailure, TaskResult};
pub use invocation::TaskInvocation;
pub use model::{Alias, DerivedTarget, TargetConfig, Task, TaskAction, TaskBody, TaskKind};
pub use pipeline::{NativeOnly, Pipeline, PipelineReport, PipelineRun, PipelineState, ScriptHost};
pub use registry::{Entry, RegistryEntry, TaskRegistry};
pub use resolver::{ResolvedStep, Resolver};

pub(crate) use builder::TaskShape;
pub(crate) use completion::AsyncSlot;
pub(crate) use model::context_error;
pub(crate) use stack::BuildStack;
