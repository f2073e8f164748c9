mod flatten;
mod task_registry;

pub use task_registry::{Entry, RegistryEntry, TaskRegistry};
