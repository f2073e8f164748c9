use indexmap::IndexMap;
use std::env;

use crate::logger::trace;

/// Read-only view of the environment bindings consulted by derived targets.
pub trait EnvProvider {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvProvider for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        let value = env::var(key).ok();
        trace!("ProcessEnv::var({}) -> {:?}", key, value);
        value
    }
}

/// Fixed key/value bindings.
#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    values: IndexMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl EnvProvider for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Overrides (from `--env KEY=VALUE`) layered over a base provider.
pub struct LayeredEnv<P> {
    overrides: MapEnv,
    base: P,
}

impl<P: EnvProvider> LayeredEnv<P> {
    pub fn new(overrides: MapEnv, base: P) -> Self {
        Self { overrides, base }
    }
}

impl<P: EnvProvider> EnvProvider for LayeredEnv<P> {
    fn var(&self, key: &str) -> Option<String> {
        self.overrides.var(key).or_else(|| self.base.var(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layered_env_prefers_overrides() {
        let base = MapEnv::new()
            .with("BROWSER_NAME", "firefox")
            .with("CI", "1");
        let overrides = MapEnv::new().with("BROWSER_NAME", "chrome");
        let env = LayeredEnv::new(overrides, base);

        assert_eq!(env.var("BROWSER_NAME").as_deref(), Some("chrome"));
        assert_eq!(env.var("CI").as_deref(), Some("1"));
        assert_eq!(env.var("MISSING"), None);
    }
}
