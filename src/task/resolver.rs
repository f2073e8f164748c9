use indexmap::IndexMap;

use super::env::EnvProvider;
use super::error::PipelineError;
use super::model::{split_invocation, TargetConfig, TaskAction};
use super::registry::{Entry, TaskRegistry};
use crate::logger::{debug, trace};

/// One (task, target) pair ready to run.
#[derive(Clone, Debug)]
pub struct ResolvedStep {
    /// `task` or `task:target`, with derived targets replaced by their effective name.
    pub label: String,
    pub task: String,
    pub target: Option<String>,
    pub config: Option<TargetConfig>,
    pub(crate) actions: TaskAction,
}

/// Resolves invocation strings against a registry.
///
/// Derived target names are computed from the environment once, when the
/// resolver is created, and reused by every step of the invocation.
pub struct Resolver<'a> {
    registry: &'a TaskRegistry,
    derived: IndexMap<(String, String), String>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a TaskRegistry, env: &dyn EnvProvider) -> Self {
        let derived = registry
            .derived_iter()
            .map(|(task, name, derived)| {
                let value = env.var(&derived.binding);
                let effective = derived.effective_name(value.as_deref());
                debug!(
                    "derived target '{}:{}' -> '{}' (${}={:?})",
                    task, name, effective, derived.binding, value
                );
                ((task.clone(), name.clone()), effective)
            })
            .collect();
        Self { registry, derived }
    }

    pub fn derived_selection(&self, task: &str, name: &str) -> Option<&str> {
        self.derived
            .get(&(task.to_string(), name.to_string()))
            .map(String::as_str)
    }

    /// Resolves `name` or `name:target` into one step, or into one step per
    /// declared target when a multi-task is invoked without a target.
    pub fn resolve(&self, invocation: &str) -> Result<Vec<ResolvedStep>, PipelineError> {
        let invocation = invocation.trim();
        trace!("resolve('{}')", invocation);

        if let Some(entry) = self.registry.lookup(invocation) {
            return self.resolve_entry(invocation, entry, None);
        }

        let (task, target) = split_invocation(invocation);
        match (self.registry.lookup(task), target) {
            (Some(entry), Some(target)) => self.resolve_entry(task, entry, Some(target)),
            _ => Err(PipelineError::UnknownTask(invocation.to_string())),
        }
    }

    fn resolve_entry(
        &self,
        name: &str,
        entry: Entry<'_>,
        target: Option<&str>,
    ) -> Result<Vec<ResolvedStep>, PipelineError> {
        match (entry, target) {
            (Entry::Alias(_), _) => Err(PipelineError::InvalidName(format!(
                "'{}' is an alias and must be flattened before it is resolved.",
                name
            ))),
            (Entry::Simple(_), Some(target)) => Err(PipelineError::TargetNotApplicable {
                task: name.to_string(),
                target: target.to_string(),
            }),
            (Entry::Simple(task), None) => Ok(vec![ResolvedStep {
                label: name.to_string(),
                task: name.to_string(),
                target: None,
                config: None,
                actions: actions_of(name, &task.actions)?,
            }]),
            (Entry::Multi(task, targets), None) => {
                let actions = actions_of(name, &task.actions)?;
                Ok(targets
                    .iter()
                    .map(|(target, config)| multi_step(name, target, config, &actions))
                    .collect())
            }
            (Entry::Multi(task, targets), Some(requested)) => {
                let actions = actions_of(name, &task.actions)?;
                let effective = self.effective_target(name, requested, targets);
                let config = targets.get(effective).ok_or_else(|| {
                    PipelineError::UnknownTarget {
                        task: name.to_string(),
                        target: effective.to_string(),
                    }
                })?;
                Ok(vec![multi_step(name, effective, config, &actions)])
            }
        }
    }

    fn effective_target<'t>(
        &'t self,
        task: &str,
        requested: &'t str,
        declared: &IndexMap<String, TargetConfig>,
    ) -> &'t str {
        if declared.contains_key(requested) {
            return requested;
        }
        self.derived_selection(task, requested).unwrap_or(requested)
    }
}

fn actions_of(name: &str, actions: &Option<TaskAction>) -> Result<TaskAction, PipelineError> {
    actions
        .clone()
        .ok_or_else(|| PipelineError::MissingActions(name.to_string()))
}

fn multi_step(
    task: &str,
    target: &str,
    config: &TargetConfig,
    actions: &TaskAction,
) -> ResolvedStep {
    ResolvedStep {
        label: format!("{}:{}", task, target),
        task: task.to_string(),
        target: Some(target.to_string()),
        config: Some(config.clone()),
        actions: actions.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::env::MapEnv;
    use crate::task::model::{DerivedTarget, Task};
    use rhai::{Dynamic, Map};
    use std::cell::Cell;

    fn config(value: &str) -> TargetConfig {
        let mut map = Map::new();
        map.insert("browser".into(), Dynamic::from(value.to_string()));
        map
    }

    fn registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        registry.register("lint", |_| Ok(())).unwrap();
        registry.register("gem:only", |_| Ok(())).unwrap();
        registry
            .register_multi(
                "webdriver",
                [
                    ("local", config("phantomjs")),
                    ("ie8", config("internet explorer")),
                    ("chrome", config("chrome")),
                ],
                |_| Ok(()),
            )
            .unwrap();
        registry
            .register_derived_target(
                "webdriver",
                "browser",
                DerivedTarget::new("BROWSER_NAME", "ie8"),
            )
            .unwrap();
        registry
    }

    fn labels(steps: &[ResolvedStep]) -> Vec<&str> {
        steps.iter().map(|step| step.label.as_str()).collect()
    }

    #[test]
    fn multi_task_without_target_expands_in_declaration_order() {
        let registry = registry();
        let resolver = Resolver::new(&registry, &MapEnv::new());
        let steps = resolver.resolve("webdriver").unwrap();
        assert_eq!(
            labels(&steps),
            ["webdriver:local", "webdriver:ie8", "webdriver:chrome"]
        );
        assert_eq!(steps[1].target.as_deref(), Some("ie8"));
        let browser = steps[1].config.as_ref().unwrap()["browser"].clone();
        assert_eq!(browser.into_string().unwrap(), "internet explorer");
    }

    #[test]
    fn explicit_target_resolves_single_step() {
        let registry = registry();
        let resolver = Resolver::new(&registry, &MapEnv::new());
        let steps = resolver.resolve("webdriver:chrome").unwrap();
        assert_eq!(labels(&steps), ["webdriver:chrome"]);
    }

    #[test]
    fn exact_name_with_colon_wins_over_split() {
        let registry = registry();
        let resolver = Resolver::new(&registry, &MapEnv::new());
        let steps = resolver.resolve("gem:only").unwrap();
        assert_eq!(steps[0].task, "gem:only");
        assert_eq!(steps[0].target, None);
    }

    #[test]
    fn unknown_task_and_target_fail() {
        let registry = registry();
        let resolver = Resolver::new(&registry, &MapEnv::new());
        assert_eq!(
            resolver.resolve("jshint").unwrap_err(),
            PipelineError::UnknownTask("jshint".to_string())
        );
        assert_eq!(
            resolver.resolve("nope:debug").unwrap_err(),
            PipelineError::UnknownTask("nope:debug".to_string())
        );
        assert_eq!(
            resolver.resolve("webdriver:safari").unwrap_err(),
            PipelineError::UnknownTarget {
                task: "webdriver".to_string(),
                target: "safari".to_string()
            }
        );
    }

    #[test]
    fn target_on_simple_task_is_not_applicable() {
        let registry = registry();
        let resolver = Resolver::new(&registry, &MapEnv::new());
        assert_eq!(
            resolver.resolve("lint:strict").unwrap_err(),
            PipelineError::TargetNotApplicable {
                task: "lint".to_string(),
                target: "strict".to_string()
            }
        );
    }

    #[test]
    fn derived_target_uses_binding_or_fallback() {
        let registry = registry();

        let env = MapEnv::new().with("BROWSER_NAME", "chrome");
        let resolver = Resolver::new(&registry, &env);
        assert_eq!(labels(&resolver.resolve("webdriver:browser").unwrap()), ["webdriver:chrome"]);

        let resolver = Resolver::new(&registry, &MapEnv::new());
        assert_eq!(labels(&resolver.resolve("webdriver:browser").unwrap()), ["webdriver:ie8"]);
    }

    #[test]
    fn derived_target_to_undeclared_name_is_unknown_target() {
        let registry = registry();
        let env = MapEnv::new().with("BROWSER_NAME", "opera");
        let resolver = Resolver::new(&registry, &env);
        assert_eq!(
            resolver.resolve("webdriver:browser").unwrap_err(),
            PipelineError::UnknownTarget {
                task: "webdriver".to_string(),
                target: "opera".to_string()
            }
        );
    }

    struct CountingEnv {
        reads: Cell<usize>,
    }

    impl EnvProvider for CountingEnv {
        fn var(&self, _key: &str) -> Option<String> {
            self.reads.set(self.reads.get() + 1);
            Some("chrome".to_string())
        }
    }

    #[test]
    fn derived_binding_is_read_once_per_resolver() {
        let registry = registry();
        let env = CountingEnv { reads: Cell::new(0) };
        let resolver = Resolver::new(&registry, &env);
        resolver.resolve("webdriver:browser").unwrap();
        resolver.resolve("webdriver:browser").unwrap();
        assert_eq!(env.reads.get(), 1);
    }

    #[test]
    fn task_without_actions_is_rejected() {
        let mut registry = TaskRegistry::new();
        registry.insert_task("empty", Task::default()).unwrap();
        let resolver = Resolver::new(&registry, &MapEnv::new());
        assert_eq!(
            resolver.resolve("empty").unwrap_err(),
            PipelineError::MissingActions("empty".to_string())
        );
    }
}
