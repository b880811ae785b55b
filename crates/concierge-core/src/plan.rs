//! Plan types: the ordered tool-invocation sequence proposed for one
//! request.
//!
//! A [`Plan`] is transient. It is produced by the planner, checked by the
//! validator, driven by the executor, and discarded; only a per-step trace
//! summary survives into the conversation turn metadata.
//!
//! Tool names in a raw plan are plain strings on purpose: the planner is an
//! untrusted producer and may emit names that do not exist. Turning a name
//! into anything trusted is the validator's job, not the parser's.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A reference to the output of an earlier step in the same plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Zero-based index of the producing step.
    pub step: usize,
    /// Name of the output field to read from that step's success payload.
    pub field: String,
}

/// One input argument of a plan step: either a literal JSON value or a
/// binding to an earlier step's output.
///
/// The planner emits bindings as `{"$bind": {"step": 0, "field": "id"}}`;
/// any other JSON value is taken literally. A literal object that itself
/// contains a `$bind` key is not representable, which is acceptable for
/// tool arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepArg {
    Binding {
        #[serde(rename = "$bind")]
        bind: Binding,
    },
    Literal(Value),
}

impl StepArg {
    pub fn literal(value: Value) -> Self {
        StepArg::Literal(value)
    }

    pub fn binding(step: usize, field: &str) -> Self {
        StepArg::Binding {
            bind: Binding {
                step,
                field: field.to_string(),
            },
        }
    }

    /// The binding target, if this argument is a binding.
    pub fn as_binding(&self) -> Option<&Binding> {
        match self {
            StepArg::Binding { bind } => Some(bind),
            StepArg::Literal(_) => None,
        }
    }
}

/// Lifecycle state of a plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed { message: String },
    /// The step never ran because a step it depends on failed.
    Skipped { reason: String },
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Failed { .. } | StepStatus::Skipped { .. }
        )
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        StepStatus::Pending
    }
}

/// One step of a plan: a tool name and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Raw tool name as proposed by the planner; validated later.
    pub tool: String,
    #[serde(default)]
    pub args: BTreeMap<String, StepArg>,
    #[serde(default)]
    pub status: StepStatus,
}

impl PlanStep {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            args: BTreeMap::new(),
            status: StepStatus::Pending,
        }
    }

    pub fn with_arg(mut self, name: &str, arg: StepArg) -> Self {
        self.args.insert(name.to_string(), arg);
        self
    }

    /// Iterate over the binding arguments of this step.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.args
            .iter()
            .filter_map(|(name, arg)| arg.as_binding().map(|b| (name.as_str(), b)))
    }
}

/// An ordered sequence of plan steps proposed for one user request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// What the planner produced: either a plan to execute or a direct answer
/// requiring no tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerOutput {
    Plan(Plan),
    Answer(String),
}
