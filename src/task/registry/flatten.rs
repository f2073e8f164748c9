use super::task_registry::{Entry, TaskRegistry};
use crate::logger::trace;
use crate::task::error::PipelineError;

impl TaskRegistry {
    /// Expands aliases in place, depth first, preserving declaration order.
    ///
    /// Non-alias invocation strings are passed through untouched; they are
    /// validated when resolved. An alias that reaches itself again fails with
    /// [`PipelineError::CyclicAliasReference`].
    pub fn flatten<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>, PipelineError> {
        let mut steps = Vec::new();
        let mut stack = Vec::new();
        for name in names {
            self.expand(name.as_ref().trim(), &mut stack, &mut steps)?;
        }
        trace!("flatten({}) -> {:?}", names.len(), steps);
        Ok(steps)
    }

    fn expand(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<(), PipelineError> {
        let alias = match self.lookup(name) {
            Some(Entry::Alias(alias)) => alias,
            _ => {
                out.push(name.to_string());
                return Ok(());
            }
        };

        if let Some(start) = stack.iter().position(|open| open == name) {
            let mut chain = stack[start..].to_vec();
            chain.push(name.to_string());
            return Err(PipelineError::CyclicAliasReference { chain });
        }

        stack.push(name.to_string());
        for step in &alias.steps {
            self.expand(step.trim(), stack, out)?;
        }
        stack.pop();
        Ok(())
    }
}
