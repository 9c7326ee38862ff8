//! Crate-wide error taxonomy (spec §7). The narrower [`crate::loader::LoadError`] stays
//! separate the way `graph::CompilationError` stays separate from the top-level `AgentError`
//! the teacher uses; it converts into a [`RuntimeError`] only at the boundary where a caller
//! needs one flat type (the HTTP bridge, mainly).

use thiserror::Error;

/// Top-level error kind surfaced to a caller of the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("schema invalid: {0}")]
    SchemaInvalid(String),

    #[error("reference invalid: {0}")]
    ReferenceInvalid(String),

    #[error("step failure: {0}")]
    StepFailure(String),

    #[error("workflow failure: {0}")]
    WorkflowFailure(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("cancellation requested")]
    CancellationRequested,
}

impl From<crate::loader::LoadError> for RuntimeError {
    fn from(e: crate::loader::LoadError) -> Self {
        match e {
            crate::loader::LoadError::SchemaInvalid(msg) => RuntimeError::SchemaInvalid(msg),
            crate::loader::LoadError::ReferenceInvalid(msg) => RuntimeError::ReferenceInvalid(msg),
            crate::loader::LoadError::Io(e) => RuntimeError::SchemaInvalid(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_not_found_displays_id() {
        let e = RuntimeError::AgentNotFound("abc".into());
        assert_eq!(e.to_string(), "agent not found: abc");
    }

    #[test]
    fn blocked_displays_reason() {
        let e = RuntimeError::Blocked("rule 1".into());
        assert_eq!(e.to_string(), "blocked: rule 1");
    }
}
