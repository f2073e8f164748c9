use rhai::{EvalAltResult, Position};

use crate::task::error::PipelineError;

pub(crate) fn context_error(msg: impl Into<String>) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(msg.into().into(), Position::NONE).into()
}

/// Splits `task:target` at the first colon.
pub(crate) fn split_invocation(invocation: &str) -> (&str, Option<&str>) {
    match invocation.split_once(':') {
        Some((task, target)) => (task, Some(target)),
        None => (invocation, None),
    }
}

pub(crate) fn validate_name(kind: &str, name: &str) -> Result<String, PipelineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidName(format!(
            "{} name cannot be empty.",
            kind
        )));
    }
    Ok(trimmed.to_string())
}
