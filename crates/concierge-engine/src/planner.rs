//! The planner: turns a message plus context into a candidate plan.
//!
//! The planner is a probabilistic component and is treated as untrusted
//! input by everything downstream. Its output is parsed structurally here
//! (strict JSON shape) but never authorized here: tool names, arguments,
//! and orderings are only trusted after the validator has passed them.

use std::fmt::Write as _;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use concierge_core::{ConversationTurn, Plan, PlannerOutput};
use concierge_tools::ToolCatalog;

use crate::config::EngineConfig;
use crate::llm::{LlmClient, LlmError, LlmRequest};
use crate::router::Classification;

/// Planner failures.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The upstream language model could not be reached. The pipeline
    /// falls back to a fixed "cannot process right now" answer, never to
    /// blind tool execution.
    #[error("planner unavailable: {0}")]
    Unavailable(#[from] LlmError),

    /// The model's output did not parse into the required JSON shape.
    #[error("planner output malformed: {0}")]
    Malformed(String),
}

/// Generates a plan or a direct answer for one message.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        message: &str,
        classification: &Classification,
        history: &[ConversationTurn],
        catalog: &ToolCatalog,
    ) -> Result<PlannerOutput, PlanError>;
}

/// LLM-backed planner.
pub struct LlmPlanner<C: LlmClient> {
    client: C,
    config: EngineConfig,
}

impl<C: LlmClient> LlmPlanner<C> {
    pub fn new(client: C, config: EngineConfig) -> Self {
        Self { client, config }
    }

    fn system_prompt(&self, catalog: &ToolCatalog) -> String {
        let mut out = String::from(
            "You are a planning assistant. Decide whether the user's request needs tools.\n\
             Respond with ONLY one JSON object, no prose, in one of two shapes:\n\
             {\"answer\": \"...\"} for requests needing no tools, or\n\
             {\"plan\": {\"steps\": [{\"tool\": \"name\", \"args\": {...}}]}}.\n\
             An argument may be a literal, or a reference to an earlier step's output:\n\
             {\"$bind\": {\"step\": 0, \"field\": \"id\"}} (zero-based, earlier steps only).\n\
             Use only tool names from the catalog below. Do not invent tools or fields.\n\n\
             Tool catalog:\n",
        );
        for descriptor in catalog.descriptors() {
            let _ = writeln!(out, "- name: {}", descriptor.name);
            let _ = writeln!(out, "  description: {}", descriptor.description);
            let _ = writeln!(out, "  fields:");
            for field in &descriptor.fields {
                let _ = writeln!(
                    out,
                    "    - {} ({:?}{})",
                    field.name,
                    field.kind,
                    if field.required { ", required" } else { "" }
                );
            }
            if let Some(pre) = &descriptor.precondition {
                let _ = writeln!(
                    out,
                    "  precondition: run {} first and bind its '{}' output to '{}'",
                    pre.requires_tool, pre.provides_field, pre.binds_to
                );
            }
        }
        out
    }

    fn user_prompt(
        &self,
        message: &str,
        classification: &Classification,
        history: &[ConversationTurn],
    ) -> String {
        let mut out = String::new();
        if !history.is_empty() {
            out.push_str("Conversation so far:\n");
            for turn in history.iter().rev().take(self.config.max_history).rev() {
                for msg in &turn.messages {
                    let _ = writeln!(out, "- {}: {}", msg.role, msg.text);
                }
            }
            out.push('\n');
        }
        let _ = writeln!(out, "Routing hint: {}", classification.category.as_str());
        if !classification.signals.is_empty() {
            let signals: Vec<_> = classification.signals.iter().map(|s| s.as_str()).collect();
            let _ = writeln!(out, "Signals: {}", signals.join(", "));
        }
        let _ = write!(out, "\nUser request:\n{message}\n\nReturn JSON only.");
        out
    }
}

#[async_trait]
impl<C: LlmClient> Planner for LlmPlanner<C> {
    async fn plan(
        &self,
        message: &str,
        classification: &Classification,
        history: &[ConversationTurn],
        catalog: &ToolCatalog,
    ) -> Result<PlannerOutput, PlanError> {
        let request = LlmRequest {
            system: self.system_prompt(catalog),
            user: self.user_prompt(message, classification, history),
            model: self.config.planner_model.clone(),
            temperature: self.config.planner_temperature,
        };

        let raw = self.client.complete(request).await?;
        let output = parse_planner_output(&raw)?;
        if let PlannerOutput::Plan(plan) = &output {
            debug!(steps = plan.len(), "planner proposed a plan");
        }
        Ok(output)
    }
}

/// Parse raw model output into a [`PlannerOutput`].
///
/// Tolerates surrounding prose and markdown fences by extracting the
/// outermost JSON object; everything inside it must match the required
/// shape exactly.
pub fn parse_planner_output(raw: &str) -> Result<PlannerOutput, PlanError> {
    let start = raw
        .find('{')
        .ok_or_else(|| PlanError::Malformed("no JSON object in output".to_string()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| PlanError::Malformed("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(PlanError::Malformed("unterminated JSON object".to_string()));
    }

    #[derive(serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct RawOutput {
        #[serde(default)]
        answer: Option<String>,
        #[serde(default)]
        plan: Option<Plan>,
    }

    let parsed: RawOutput = serde_json::from_str(&raw[start..=end])
        .map_err(|e| PlanError::Malformed(e.to_string()))?;

    match (parsed.answer, parsed.plan) {
        (Some(answer), None) => Ok(PlannerOutput::Answer(answer)),
        (None, Some(plan)) if !plan.is_empty() => Ok(PlannerOutput::Plan(plan)),
        (None, Some(_)) => Err(PlanError::Malformed("plan has no steps".to_string())),
        (Some(_), Some(_)) => Err(PlanError::Malformed(
            "output has both an answer and a plan".to_string(),
        )),
        (None, None) => Err(PlanError::Malformed(
            "output has neither an answer nor a plan".to_string(),
        )),
    }
}
