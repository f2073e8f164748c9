use super::model::{Alias, Task, TaskKind};
use super::registry::{RegistryEntry, TaskRegistry};
use crate::logger::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListRenderMode {
    Tree,
    Flat,
}

#[derive(Debug, Default, Clone)]
pub struct ListOutput {
    pub items: Vec<ListItem>,
    pub messages: Vec<ListMessage>,
}

impl ListOutput {
    fn push_message(&mut self, level: ListMessageLevel, text: impl Into<String>) {
        self.messages.push(ListMessage {
            level,
            text: text.into(),
        });
    }

    fn push_item(&mut self, item: ListItem) {
        self.items.push(item);
    }
}

#[derive(Debug, Clone)]
pub struct ListItem {
    pub kind: ListItemKind,
    pub depth: usize,
    pub name: String,
    /// The string to pass to `pipewright run`.
    pub full_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListItemKind {
    Task,
    MultiTask,
    Target,
    DerivedTarget,
    Alias,
}

#[derive(Debug, Clone)]
pub struct ListMessage {
    pub level: ListMessageLevel,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMessageLevel {
    Info,
    Warn,
}

impl TaskRegistry {
    pub fn list(&self, name: Option<&str>, mode: ListRenderMode) {
        let output = self.collect_list_output(name);
        crate::printer::print_list(&output, mode);
    }

    pub fn collect_list_output(&self, name: Option<&str>) -> ListOutput {
        let mut output = ListOutput::default();

        for overwritten in self.overwritten() {
            output.push_message(
                ListMessageLevel::Warn,
                format!(
                    "'{}' was registered more than once; the last definition is used.",
                    overwritten
                ),
            );
        }

        if let Some(name) = name {
            trace!("list request for '{}'", name);
            let name = name.trim();
            match self.entries_iter().find(|(entry_name, _)| *entry_name == name) {
                Some((entry_name, entry)) => self.collect_entry(entry_name, entry, &mut output),
                None => output.push_message(
                    ListMessageLevel::Warn,
                    format!("Task '{}' does not exist.", name),
                ),
            }
            return output;
        }

        for (entry_name, entry) in self.entries_iter() {
            self.collect_entry(entry_name, entry, &mut output);
        }
        if output.items.is_empty() {
            output.push_message(ListMessageLevel::Info, "No tasks registered.");
        }
        output
    }

    fn collect_entry(&self, name: &str, entry: &RegistryEntry, output: &mut ListOutput) {
        match entry {
            RegistryEntry::Task(task) => self.collect_task(name, task, output),
            RegistryEntry::Alias(alias) => collect_alias(name, alias, output),
        }
    }

    fn collect_task(&self, name: &str, task: &Task, output: &mut ListOutput) {
        let targets = match &task.kind {
            TaskKind::Simple => {
                output.push_item(item(ListItemKind::Task, 0, name, name, task.description.clone()));
                return;
            }
            TaskKind::Multi { targets } => targets,
        };

        output.push_item(item(
            ListItemKind::MultiTask,
            0,
            name,
            name,
            task.description.clone(),
        ));
        for target in targets.keys() {
            output.push_item(item(
                ListItemKind::Target,
                1,
                target,
                &format!("{}:{}", name, target),
                None,
            ));
        }
        for (task_name, derived_name, derived) in self.derived_iter() {
            if task_name != name {
                continue;
            }
            output.push_item(item(
                ListItemKind::DerivedTarget,
                1,
                derived_name,
                &format!("{}:{}", name, derived_name),
                Some(format!(
                    "{}${} (fallback '{}')",
                    derived.prefix, derived.binding, derived.fallback
                )),
            ));
        }
    }
}

fn collect_alias(name: &str, alias: &Alias, output: &mut ListOutput) {
    let description = alias
        .description
        .clone()
        .unwrap_or_else(|| alias.steps.join(", "));
    output.push_item(item(ListItemKind::Alias, 0, name, name, Some(description)));
}

fn item(
    kind: ListItemKind,
    depth: usize,
    name: &str,
    full_name: &str,
    description: Option<String>,
) -> ListItem {
    ListItem {
        kind,
        depth,
        name: name.to_string(),
        full_name: full_name.to_string(),
        description,
    }
}
