use indexmap::IndexMap;
use rhai::EvalAltResult;
use std::rc::Rc;

use crate::logger::{debug, trace, warn};
use crate::task::error::{PipelineError, TaskResult};
use crate::task::invocation::TaskInvocation;
use crate::task::model::{
    context_error, validate_name, Alias, DerivedTarget, TargetConfig, Task, TaskAction, TaskKind,
};

#[derive(Clone, Debug)]
pub enum RegistryEntry {
    Task(Task),
    Alias(Alias),
}

/// Typed result of looking a name up.
#[derive(Clone, Copy, Debug)]
pub enum Entry<'a> {
    Simple(&'a Task),
    Multi(&'a Task, &'a IndexMap<String, TargetConfig>),
    Alias(&'a Alias),
}

/// Tasks and aliases share one namespace; re-registering a name replaces the
/// previous entry unless the registry is strict.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    entries: IndexMap<String, RegistryEntry>,
    derived: IndexMap<String, IndexMap<String, DerivedTarget>>,
    default_task: Option<String>,
    overwritten: Vec<String>,
    strict: bool,
    frozen: bool,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that rejects re-registration of an existing name.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn register<F>(&mut self, name: &str, body: F) -> Result<(), PipelineError>
    where
        F: Fn(&mut TaskInvocation<'_>) -> TaskResult + 'static,
    {
        self.insert_task(name, Task::simple(TaskAction::Native(Rc::new(body))))
    }

    pub fn register_multi<I, K, F>(
        &mut self,
        name: &str,
        targets: I,
        body: F,
    ) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = (K, TargetConfig)>,
        K: Into<String>,
        F: Fn(&mut TaskInvocation<'_>) -> TaskResult + 'static,
    {
        let targets = targets
            .into_iter()
            .map(|(key, config)| (key.into(), config))
            .collect();
        self.insert_task(
            name,
            Task::multi(targets, TaskAction::Native(Rc::new(body))),
        )
    }

    pub fn register_alias<I, S>(&mut self, name: &str, steps: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps = steps.into_iter().map(Into::into).collect();
        self.insert_alias(name, Alias::new(steps))
    }

    pub fn insert_task(&mut self, name: &str, task: Task) -> Result<(), PipelineError> {
        let name = validate_name("Task", name)?;
        if let TaskKind::Multi { targets } = &task.kind {
            for target in targets.keys() {
                validate_name("Target", target)?;
            }
        }
        debug!("registering task '{}' (multi={})", name, task.is_multi());
        self.insert_entry(name, RegistryEntry::Task(task))
    }

    pub fn insert_alias(&mut self, name: &str, alias: Alias) -> Result<(), PipelineError> {
        let name = validate_name("Alias", name)?;
        if alias.steps.iter().any(|step| step.trim().is_empty()) {
            return Err(PipelineError::InvalidName(format!(
                "Alias '{}' contains an empty step.",
                name
            )));
        }
        debug!("registering alias '{}' -> {:?}", name, alias.steps);
        self.insert_entry(name, RegistryEntry::Alias(alias))
    }

    pub fn register_derived_target(
        &mut self,
        task: &str,
        name: &str,
        derived: DerivedTarget,
    ) -> Result<(), PipelineError> {
        let task = validate_name("Task", task)?;
        let name = validate_name("Derived target", name)?;
        self.ensure_mutable(&format!("{}:{}", task, name))?;
        debug!(
            "registering derived target '{}:{}' from ${} (fallback '{}')",
            task, name, derived.binding, derived.fallback
        );
        let previous = self.derived.entry(task.clone()).or_default().insert(name.clone(), derived);
        if previous.is_some() {
            self.note_overwrite(format!("{}:{}", task, name))?;
        }
        Ok(())
    }

    fn insert_entry(&mut self, name: String, entry: RegistryEntry) -> Result<(), PipelineError> {
        self.ensure_mutable(&name)?;
        if self.entries.contains_key(&name) {
            self.note_overwrite(name.clone())?;
        }
        // insert() keeps the original position of a replaced key.
        self.entries.insert(name, entry);
        Ok(())
    }

    fn note_overwrite(&mut self, name: String) -> Result<(), PipelineError> {
        if self.strict {
            return Err(PipelineError::DuplicateName(name));
        }
        warn!("'{}' was registered again; the previous definition is replaced", name);
        self.overwritten.push(name);
        Ok(())
    }

    fn ensure_mutable(&self, name: &str) -> Result<(), PipelineError> {
        if self.frozen {
            return Err(PipelineError::RegistryFrozen(name.to_string()));
        }
        Ok(())
    }

    /// Ends the configuration phase. Later registrations fail.
    pub fn freeze(&mut self) {
        if !self.frozen {
            trace!("registry frozen with {} entries", self.entries.len());
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn lookup(&self, name: &str) -> Option<Entry<'_>> {
        let entry = match self.entries.get(name)? {
            RegistryEntry::Alias(alias) => Entry::Alias(alias),
            RegistryEntry::Task(task) => match &task.kind {
                TaskKind::Simple => Entry::Simple(task),
                TaskKind::Multi { targets } => Entry::Multi(task, targets),
            },
        };
        trace!("lookup('{}') -> {:?}", name, entry_kind(&entry));
        Some(entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn derived_target(&self, task: &str, name: &str) -> Option<&DerivedTarget> {
        self.derived.get(task).and_then(|targets| targets.get(name))
    }

    pub(crate) fn entries_iter(&self) -> impl Iterator<Item = (&String, &RegistryEntry)> {
        self.entries.iter()
    }

    pub(crate) fn derived_iter(
        &self,
    ) -> impl Iterator<Item = (&String, &String, &DerivedTarget)> {
        self.derived.iter().flat_map(|(task, targets)| {
            targets
                .iter()
                .map(move |(name, derived)| (task, name, derived))
        })
    }

    /// Names registered more than once during configuration.
    pub fn overwritten(&self) -> &[String] {
        &self.overwritten
    }

    pub(crate) fn set_default_task(&mut self, name: &str) -> Result<(), Box<EvalAltResult>> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(context_error("default_task() requires a task name."));
        }
        if self.default_task.is_some() {
            return Err(context_error(
                "default_task() can only be defined once per script.",
            ));
        }
        self.default_task = Some(trimmed.to_string());
        Ok(())
    }

    /// `default_task()` if set, otherwise an entry literally named `default`.
    pub fn default_task(&self) -> Option<String> {
        self.default_task
            .clone()
            .or_else(|| self.contains("default").then(|| "default".to_string()))
    }
}

fn entry_kind(entry: &Entry<'_>) -> &'static str {
    match entry {
        Entry::Simple(_) => "simple",
        Entry::Multi(..) => "multi",
        Entry::Alias(_) => "alias",
    }
}
