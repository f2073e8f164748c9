#[derive(Clone, Default, Debug)]
pub struct Alias {
    pub description: Option<String>,
    /// Invocation strings (`task`, `task:target` or another alias), in order.
    pub steps: Vec<String>,
}

impl Alias {
    pub fn new(steps: Vec<String>) -> Self {
        Self {
            description: None,
            steps,
        }
    }
}

/// A multi-task target whose effective name comes from an environment binding.
///
/// The effective target is `prefix` followed by the binding's value, or by
/// `fallback` when the binding is unset or empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedTarget {
    pub binding: String,
    pub fallback: String,
    pub prefix: String,
}

impl DerivedTarget {
    pub fn new(binding: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            binding: binding.into(),
            fallback: fallback.into(),
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn effective_name(&self, value: Option<&str>) -> String {
        let chosen = value
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.fallback);
        format!("{}{}", self.prefix, chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_name_uses_binding_value() {
        let derived = DerivedTarget::new("BROWSER_NAME", "ie8");
        assert_eq!(derived.effective_name(Some("chrome")), "chrome");
    }

    #[test]
    fn effective_name_falls_back_when_absent_or_empty() {
        let derived = DerivedTarget::new("BROWSER_NAME", "ie8").with_prefix("saucelabs_");
        assert_eq!(derived.effective_name(None), "saucelabs_ie8");
        assert_eq!(derived.effective_name(Some("")), "saucelabs_ie8");
        assert_eq!(derived.effective_name(Some("ios4")), "saucelabs_ios4");
    }
}
