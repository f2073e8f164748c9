use indexmap::IndexMap;
use rhai::Map;

use super::action::TaskAction;

/// Per-target option record. Opaque to the orchestrator.
pub type TargetConfig = Map;

#[derive(Clone, Default, Debug)]
pub struct Task {
    pub description: Option<String>,
    pub kind: TaskKind,
    pub actions: Option<TaskAction>,
}

#[derive(Clone, Default, Debug)]
pub enum TaskKind {
    #[default]
    Simple,
    /// Targets in declaration order.
    Multi {
        targets: IndexMap<String, TargetConfig>,
    },
}

impl Task {
    pub fn simple(actions: TaskAction) -> Self {
        Self {
            description: None,
            kind: TaskKind::Simple,
            actions: Some(actions),
        }
    }

    pub fn multi(targets: IndexMap<String, TargetConfig>, actions: TaskAction) -> Self {
        Self {
            description: None,
            kind: TaskKind::Multi { targets },
            actions: Some(actions),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self.kind, TaskKind::Multi { .. })
    }

    pub fn targets(&self) -> Option<&IndexMap<String, TargetConfig>> {
        match &self.kind {
            TaskKind::Simple => None,
            TaskKind::Multi { targets } => Some(targets),
        }
    }
}
