mod task_builder;

pub use task_builder::{TaskBuilder, TaskShape};
