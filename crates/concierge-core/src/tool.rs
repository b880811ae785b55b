//! Tool descriptors and the collaborator interface.
//!
//! A [`ToolDescriptor`] is the static, immutable description of one
//! external capability: its name, the input fields it accepts, and an
//! optional precondition tying it to a prior lookup step. Descriptors are
//! loaded once at startup and are the planner's only source of truth about
//! which actions exist.
//!
//! A [`ToolCollaborator`] is the runtime counterpart: the asynchronous
//! backend that actually performs the action. The engine never talks to a
//! backend except through this trait.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::ToolName;

/// The type of a single input field of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
}

impl FieldKind {
    /// Check whether a JSON value matches this field kind.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
        }
    }
}

/// One named, typed input field of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
        }
    }
}

/// A declared dependency on a prior tool invocation in the same plan.
///
/// A destructive tool (e.g. `delete_event`) declares that some earlier
/// step must have run `requires_tool`, and that this tool's `binds_to`
/// input field must be bound to the `provides_field` output of that step.
/// The validator enforces this before any step executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    /// Tool that must appear earlier in the plan.
    pub requires_tool: ToolName,
    /// Output field the prior step supplies.
    pub provides_field: String,
    /// Input field of this tool that must be bound to that output.
    pub binds_to: String,
}

/// Static description of one tool: name, schema, precondition.
///
/// Immutable at runtime; the catalog hands out shared references only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: ToolName,
    /// Human-readable description shown to the planner.
    pub description: String,
    pub fields: Vec<FieldSpec>,
    pub precondition: Option<Precondition>,
    /// Fixed system-default arguments used when the validator auto-inserts
    /// this tool as a repair step. Never taken from planner output.
    #[serde(default)]
    pub repair_args: std::collections::BTreeMap<String, Value>,
}

impl ToolDescriptor {
    /// Look up a field spec by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterate over the required fields of this tool.
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }
}

/// Classification of a collaborator failure.
///
/// The executor uses this to distinguish failures that could be retried by
/// an outer layer (`Transient`) from ones that cannot (`NotFound`,
/// `InvalidInput`). The engine itself never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationErrorKind {
    /// The referenced resource does not exist.
    NotFound,
    /// Temporary backend failure; a later identical call may succeed.
    Transient,
    /// The arguments were rejected by the backend.
    InvalidInput,
}

impl std::fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationErrorKind::NotFound => write!(f, "not_found"),
            InvocationErrorKind::Transient => write!(f, "transient"),
            InvocationErrorKind::InvalidInput => write!(f, "invalid_input"),
        }
    }
}

/// The result of one tool invocation, as reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// The invocation succeeded with a structured payload.
    Success { payload: Value },
    /// The invocation failed with a classified reason.
    Failure {
        kind: InvocationErrorKind,
        message: String,
    },
}

impl InvocationOutcome {
    pub fn success(payload: Value) -> Self {
        InvocationOutcome::Success { payload }
    }

    pub fn failure(kind: InvocationErrorKind, message: impl Into<String>) -> Self {
        InvocationOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Success { .. })
    }

    /// The success payload, if any.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            InvocationOutcome::Success { payload } => Some(payload),
            InvocationOutcome::Failure { .. } => None,
        }
    }

}

/// Asynchronous backend for one tool.
///
/// Implementations must be safe to call concurrently from multiple request
/// pipelines. All failures, infrastructure and domain alike, travel inside
/// [`InvocationOutcome::Failure`] with a classifying kind.
#[async_trait::async_trait]
pub trait ToolCollaborator: Send + Sync {
    /// Perform the action described by `args`.
    async fn invoke(&self, args: Value) -> InvocationOutcome;
}
