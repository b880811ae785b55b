//! Error taxonomy shared across the workspace.
//!
//! Plan-validation rejections and state-tier failures are defined here so
//! both the engine and the state crates speak the same error language.
//! Engine-local errors (LLM transport, pipeline) live next to the code that
//! produces them.

use thiserror::Error;

/// A reason the validator rejects a candidate plan.
///
/// Validator rejections are terminal for the plan: no step of a rejected
/// plan is ever executed. They surface to the user as a request for
/// clarification, not as an internal error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanViolation {
    /// A step references a tool name absent from the catalog.
    #[error("unknown tool '{tool}' at step {step}")]
    UnknownTool { step: usize, tool: String },

    /// A required input field is neither a literal nor a binding.
    #[error("step {step} ({tool}) is missing required argument '{field}'")]
    MissingArgument {
        step: usize,
        tool: String,
        field: String,
    },

    /// A tool's declared precondition has no qualifying earlier step, and
    /// no deterministic repair was possible.
    #[error("step {step} ({tool}) requires a prior '{requires}' step supplying '{field}'")]
    PreconditionUnmet {
        step: usize,
        tool: String,
        requires: String,
        field: String,
    },

    /// A binding references the step itself or a step after it.
    #[error("step {step} binds to step {target}, which is not earlier in the plan")]
    ForwardBinding { step: usize, target: usize },
}

/// Which storage tier an operation was talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTier {
    Cache,
    Durable,
}

impl std::fmt::Display for StateTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateTier::Cache => write!(f, "cache"),
            StateTier::Durable => write!(f, "durable"),
        }
    }
}

/// Errors from the State Manager and its tiers.
///
/// A durable-tier failure is fatal for the current request: the cache alone
/// is never authoritative, so there is nothing safe to fall back to.
#[derive(Debug, Error)]
pub enum StateError {
    /// The tier could not be reached or the operation failed outright.
    #[error("{tier} tier unavailable: {reason}")]
    Unavailable { tier: StateTier, reason: String },

    /// A stored value failed to encode or decode.
    #[error("serialization failed for {context}: {source}")]
    Serialization {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    pub fn durable(reason: impl Into<String>) -> Self {
        StateError::Unavailable {
            tier: StateTier::Durable,
            reason: reason.into(),
        }
    }

    pub fn cache(reason: impl Into<String>) -> Self {
        StateError::Unavailable {
            tier: StateTier::Cache,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_messages_name_the_step() {
        let v = PlanViolation::UnknownTool {
            step: 2,
            tool: "teleport".into(),
        };
        assert_eq!(v.to_string(), "unknown tool 'teleport' at step 2");
    }

    #[test]
    fn state_error_names_the_tier() {
        let e = StateError::durable("disk full");
        assert_eq!(e.to_string(), "durable tier unavailable: disk full");
        let e = StateError::cache("connection reset");
        assert!(e.to_string().starts_with("cache tier"));
    }
}
