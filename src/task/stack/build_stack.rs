use rhai::{EvalAltResult, FnPtr};

use crate::task::builder::{TaskBuilder, TaskShape};
use crate::task::model::{context_error, TargetConfig};
use crate::task::registry::TaskRegistry;

#[derive(Clone, Debug)]
pub(crate) enum ContextFrame {
    Root,
    Task(TaskBuilder),
}

/// Tracks which `task()`/`multi_task()` block a script is currently inside.
#[derive(Clone)]
pub struct BuildStack {
    context_stack: Vec<ContextFrame>,
}

impl Default for BuildStack {
    fn default() -> Self {
        Self {
            context_stack: vec![ContextFrame::Root],
        }
    }
}

impl BuildStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.context_stack.clear();
        self.context_stack.push(ContextFrame::Root);
    }

    pub(crate) fn begin_task(
        &mut self,
        registry: &TaskRegistry,
        name: &str,
        shape: TaskShape,
    ) -> Result<(), Box<EvalAltResult>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(context_error("Task name cannot be empty."));
        }

        match self.context_stack.last() {
            Some(ContextFrame::Root) => {}
            Some(ContextFrame::Task(_)) => {
                return Err(context_error("Nested task() calls are not supported."));
            }
            None => return Err(context_error("context mismatch: context stack is empty.")),
        }

        if registry.is_frozen() {
            return Err(context_error(format!(
                "Cannot register '{}': the registry is frozen while a pipeline runs.",
                name
            )));
        }
        if registry.is_strict() && registry.contains(name) {
            return Err(context_error(format!("Task '{}' is already defined.", name)));
        }

        self.context_stack
            .push(ContextFrame::Task(TaskBuilder::new(name.to_string(), shape)));
        Ok(())
    }

    pub(crate) fn end_task(
        &mut self,
        registry: &mut TaskRegistry,
    ) -> Result<(), Box<EvalAltResult>> {
        match self.context_stack.pop() {
            Some(ContextFrame::Task(builder)) => {
                let (name, task) = builder.build();
                registry
                    .insert_task(&name, task)
                    .map_err(|err| err.into_eval_error())
            }
            Some(ContextFrame::Root) => {
                self.reset();
                Err(context_error(
                    "context mismatch: end_task() called before task() was started.",
                ))
            }
            None => Err(context_error("context mismatch: context stack is empty.")),
        }
    }

    pub fn set_actions(&mut self, func: FnPtr) -> Result<(), Box<EvalAltResult>> {
        self.current_task_mut("actions()")?.set_actions(func);
        Ok(())
    }

    pub fn set_description(&mut self, desc: &str) -> Result<(), Box<EvalAltResult>> {
        self.current_task_mut("description()")?
            .set_description(desc);
        Ok(())
    }

    pub fn add_target(
        &mut self,
        name: &str,
        config: TargetConfig,
    ) -> Result<(), Box<EvalAltResult>> {
        self.current_task_mut("target()")?.add_target(name, config)
    }

    /// Fails unless no task block is open.
    pub fn ensure_root(&self, label: &str) -> Result<(), Box<EvalAltResult>> {
        match self.context_stack.last() {
            Some(ContextFrame::Root) => Ok(()),
            Some(ContextFrame::Task(builder)) => Err(context_error(format!(
                "{} cannot be used inside task '{}'.",
                label, builder.name
            ))),
            None => Err(context_error("context mismatch: context stack is empty.")),
        }
    }

    fn current_task_mut(&mut self, label: &str) -> Result<&mut TaskBuilder, Box<EvalAltResult>> {
        match self.context_stack.last_mut() {
            Some(ContextFrame::Task(builder)) => Ok(builder),
            Some(ContextFrame::Root) => Err(context_error(format!(
                "{} can only be used inside task() or multi_task().",
                label
            ))),
            None => Err(context_error("context mismatch: context stack is empty.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::registry::Entry;
    use rhai::{Dynamic, Map};

    fn dummy_fn_ptr() -> FnPtr {
        FnPtr::new("dummy").unwrap()
    }

    fn config(dest: &str) -> Map {
        let mut map = Map::new();
        map.insert("dest".into(), Dynamic::from(dest.to_string()));
        map
    }

    #[test]
    fn simple_task_registration() {
        let mut registry = TaskRegistry::new();
        let mut stack = BuildStack::new();

        stack.begin_task(&registry, "lint", TaskShape::Simple).unwrap();
        stack.set_description("Run jshint").unwrap();
        stack.set_actions(dummy_fn_ptr()).unwrap();
        stack.end_task(&mut registry).unwrap();

        match registry.lookup("lint") {
            Some(Entry::Simple(task)) => {
                assert_eq!(task.description.as_deref(), Some("Run jshint"));
                assert!(task.actions.is_some());
            }
            other => panic!("expected simple task, got {:?}", other),
        }
    }

    #[test]
    fn multi_task_keeps_target_order() {
        let mut registry = TaskRegistry::new();
        let mut stack = BuildStack::new();

        stack.begin_task(&registry, "jsx", TaskShape::Multi).unwrap();
        stack.add_target("release", config("build/release")).unwrap();
        stack.add_target("debug", config("build/debug")).unwrap();
        stack.add_target("test", config("build/test")).unwrap();
        stack.set_actions(dummy_fn_ptr()).unwrap();
        stack.end_task(&mut registry).unwrap();

        match registry.lookup("jsx") {
            Some(Entry::Multi(_, targets)) => {
                let names: Vec<&str> = targets.keys().map(String::as_str).collect();
                assert_eq!(names, ["release", "debug", "test"]);
            }
            other => panic!("expected multi-task, got {:?}", other),
        }
    }

    #[test]
    fn target_requires_multi_task() {
        let registry = TaskRegistry::new();
        let mut stack = BuildStack::new();
        let err = stack.add_target("debug", Map::new()).unwrap_err();
        assert!(err
            .to_string()
            .contains("target() can only be used inside task() or multi_task()."));

        stack.begin_task(&registry, "lint", TaskShape::Simple).unwrap();
        let err = stack.add_target("debug", Map::new()).unwrap_err();
        assert!(err.to_string().contains("'lint' is a simple task"));
    }

    #[test]
    fn duplicate_target_rejected() {
        let registry = TaskRegistry::new();
        let mut stack = BuildStack::new();
        stack.begin_task(&registry, "jsx", TaskShape::Multi).unwrap();
        stack.add_target("debug", Map::new()).unwrap();
        let err = stack.add_target("debug", Map::new()).unwrap_err();
        assert!(err.to_string().contains("Target 'debug' is already defined"));
    }

    #[test]
    fn nested_task_rejected() {
        let registry = TaskRegistry::new();
        let mut stack = BuildStack::new();
        stack.begin_task(&registry, "outer", TaskShape::Simple).unwrap();
        let err = stack
            .begin_task(&registry, "inner", TaskShape::Simple)
            .unwrap_err();
        assert!(err.to_string().contains("Nested task() calls are not supported"));
        assert!(stack.ensure_root("alias()").is_err());
    }

    #[test]
    fn description_outside_context_fails() {
        let mut stack = BuildStack::new();
        let err = stack.set_description("no context").unwrap_err();
        assert!(err
            .to_string()
            .contains("description() can only be used inside task() or multi_task()."));
    }

    #[test]
    fn strict_registry_rejects_redefinition_early() {
        let mut registry = TaskRegistry::strict();
        let mut stack = BuildStack::new();
        stack.begin_task(&registry, "lint", TaskShape::Simple).unwrap();
        stack.end_task(&mut registry).unwrap();

        let err = stack
            .begin_task(&registry, "lint", TaskShape::Simple)
            .unwrap_err();
        assert!(err.to_string().contains("is already defined"));
    }

    #[test]
    fn frozen_registry_rejects_new_blocks() {
        let mut registry = TaskRegistry::new();
        registry.freeze();
        let mut stack = BuildStack::new();
        let err = stack
            .begin_task(&registry, "late", TaskShape::Simple)
            .unwrap_err();
        assert!(err.to_string().contains("frozen"));
    }
}
