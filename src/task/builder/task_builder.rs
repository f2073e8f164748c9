use indexmap::IndexMap;
use rhai::{EvalAltResult, FnPtr};

use crate::task::model::{context_error, TargetConfig, Task, TaskAction, TaskKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskShape {
    Simple,
    Multi,
}

#[derive(Clone, Debug)]
pub struct TaskBuilder {
    pub(crate) name: String,
    shape: TaskShape,
    description: Option<String>,
    targets: IndexMap<String, TargetConfig>,
    actions: Option<FnPtr>,
}

impl TaskBuilder {
    pub fn new(name: String, shape: TaskShape) -> Self {
        Self {
            name,
            shape,
            description: None,
            targets: IndexMap::new(),
            actions: None,
        }
    }

    pub fn set_description(&mut self, desc: &str) {
        self.description = Some(desc.to_string());
    }

    pub fn set_actions(&mut self, func: FnPtr) {
        self.actions = Some(func);
    }

    pub fn add_target(
        &mut self,
        name: &str,
        config: TargetConfig,
    ) -> Result<(), Box<EvalAltResult>> {
        if self.shape != TaskShape::Multi {
            return Err(context_error(format!(
                "target() can only be used inside multi_task(); '{}' is a simple task.",
                self.name
            )));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(context_error("Target name cannot be empty."));
        }
        if self.targets.contains_key(name) {
            return Err(context_error(format!(
                "Target '{}' is already defined for '{}'.",
                name, self.name
            )));
        }
        self.targets.insert(name.to_string(), config);
        Ok(())
    }

    pub fn build(self) -> (String, Task) {
        let kind = match self.shape {
            TaskShape::Simple => TaskKind::Simple,
            TaskShape::Multi => TaskKind::Multi {
                targets: self.targets,
            },
        };
        let task = Task {
            description: self.description,
            kind,
            actions: self.actions.map(TaskAction::Script),
        };
        (self.name, task)
    }
}
