//! The per-message request pipeline.
//!
//! One message flows Router → Planner → Validator → Executor → State
//! Manager, as a chain of suspend points under a single overall timeout.
//! Pipelines for different messages run concurrently and share only the
//! catalog and the state tiers, both behind `Arc`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use concierge_core::{
    ConversationId, ConversationTurn, PlannerOutput, SessionId, StateError, StepTrace,
    TurnMessage, TurnMetadata,
};
use concierge_state::StateManager;
use concierge_tools::ToolCatalog;

use crate::config::EngineConfig;
use crate::executor::Executor;
use crate::metrics::EngineMetrics;
use crate::planner::{PlanError, Planner};
use crate::router;
use crate::validator;

/// Fixed fallback when the planner backend is unreachable. Never replaced
/// by blind tool execution.
const PLANNER_DOWN_ANSWER: &str =
    "I can't process that right now. Please try again in a moment.";

const UNSUPPORTED_ANSWER: &str =
    "I can help with your calendar, email, and knowledge lookups, but not with that.";

/// How a pipeline run concluded, for metrics and callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Direct answer or fully successful plan.
    Success,
    /// Plan executed but at least one step failed or was skipped.
    PartialFailure,
    /// The validator rejected the plan; the user is asked to clarify.
    PlanRejected,
    /// The planner backend was unreachable; fixed fallback answer.
    PlannerUnavailable,
}

impl PipelineOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineOutcome::Success => "success",
            PipelineOutcome::PartialFailure => "partial_failure",
            PipelineOutcome::PlanRejected => "plan_rejected",
            PipelineOutcome::PlannerUnavailable => "planner_unavailable",
        }
    }
}

/// Final product of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub answer: String,
    pub outcome: PipelineOutcome,
    pub category: &'static str,
    pub traces: Vec<StepTrace>,
}

/// Errors that abort a pipeline run without producing an answer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No active session: unknown, revoked, or expired.
    #[error("session '{0}' is not active")]
    SessionNotActive(SessionId),

    /// The durable tier failed; the request is aborted rather than served
    /// from the non-authoritative cache.
    #[error(transparent)]
    State(#[from] StateError),

    /// The overall request budget elapsed. In-flight tool invocations are
    /// left to finish but their results are discarded.
    #[error("request timed out")]
    Timeout,
}

/// The assembled engine: one instance serves all conversations.
pub struct Pipeline {
    catalog: Arc<ToolCatalog>,
    planner: Arc<dyn Planner>,
    state: Arc<StateManager>,
    executor: Executor,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<ToolCatalog>,
        planner: Arc<dyn Planner>,
        state: Arc<StateManager>,
        config: EngineConfig,
    ) -> Self {
        let executor = Executor::new(Arc::clone(&catalog), config.max_inflight_steps);
        Self {
            catalog,
            planner,
            state,
            executor,
            config,
            metrics: EngineMetrics::global(),
        }
    }

    /// Handle one user message end to end.
    pub async fn handle(
        &self,
        session_id: &SessionId,
        conversation_id: &ConversationId,
        message: &str,
    ) -> Result<PipelineResponse, PipelineError> {
        let result = tokio::time::timeout(
            self.config.request_timeout(),
            self.handle_inner(session_id, conversation_id, message),
        )
        .await;

        match result {
            Ok(response) => response,
            Err(_) => {
                warn!(%conversation_id, "pipeline timed out");
                self.metrics.record_pipeline("unknown", "timeout");
                Err(PipelineError::Timeout)
            }
        }
    }

    async fn handle_inner(
        &self,
        session_id: &SessionId,
        conversation_id: &ConversationId,
        message: &str,
    ) -> Result<PipelineResponse, PipelineError> {
        let session = self
            .state
            .require_active_session(session_id)
            .await
            .inspect(|_| self.metrics.record_state_op("get_session", "ok"))
            .inspect_err(|_| self.metrics.record_state_op("get_session", "error"))?
            .ok_or_else(|| PipelineError::SessionNotActive(session_id.clone()))?;

        let history = self
            .state
            .get_recent_turns(conversation_id, self.config.max_history)
            .await
            .inspect(|_| self.metrics.record_state_op("get_recent_turns", "ok"))
            .inspect_err(|_| self.metrics.record_state_op("get_recent_turns", "error"))?;

        let classification = router::classify(message, &history);
        let category = classification.category.as_str();
        info!(
            user = %session.user_id,
            %conversation_id,
            category,
            "handling message"
        );

        let (answer, outcome, traces) =
            if classification.category == router::IntentCategory::Unsupported {
                (UNSUPPORTED_ANSWER.to_string(), PipelineOutcome::Success, Vec::new())
            } else {
                match self
                    .planner
                    .plan(message, &classification, &history, &self.catalog)
                    .await
                {
                    Ok(PlannerOutput::Answer(answer)) => {
                        (answer, PipelineOutcome::Success, Vec::new())
                    }
                    Ok(PlannerOutput::Plan(raw)) => self.run_plan(raw).await,
                    Err(PlanError::Unavailable(error)) => {
                        warn!(%error, "planner unavailable, using fallback answer");
                        (
                            PLANNER_DOWN_ANSWER.to_string(),
                            PipelineOutcome::PlannerUnavailable,
                            Vec::new(),
                        )
                    }
                    Err(PlanError::Malformed(reason)) => {
                        // Structurally broken output is treated like a
                        // rejected plan: ask the user, execute nothing.
                        warn!(%reason, "planner output malformed");
                        (
                            clarification_answer(&reason),
                            PipelineOutcome::PlanRejected,
                            Vec::new(),
                        )
                    }
                }
            };

        let turn = ConversationTurn::new(
            conversation_id.clone(),
            vec![
                TurnMessage::user(message),
                TurnMessage::assistant(answer.clone()),
            ],
            TurnMetadata {
                category: Some(category.to_string()),
                steps: traces.clone(),
            },
        );
        self.state
            .save_turn(&turn)
            .await
            .inspect(|_| self.metrics.record_state_op("save_turn", "ok"))
            .inspect_err(|_| self.metrics.record_state_op("save_turn", "error"))?;

        self.metrics.record_pipeline(category, outcome.as_str());
        Ok(PipelineResponse {
            answer,
            outcome,
            category,
            traces,
        })
    }

    async fn run_plan(
        &self,
        raw: concierge_core::Plan,
    ) -> (String, PipelineOutcome, Vec<StepTrace>) {
        let validated = match validator::validate(raw, &self.catalog) {
            Ok(validated) => validated,
            Err(violation) => {
                info!(%violation, "plan rejected");
                return (
                    clarification_answer(&violation.to_string()),
                    PipelineOutcome::PlanRejected,
                    Vec::new(),
                );
            }
        };

        let report = self.executor.execute(validated).await;
        for step in &report.steps {
            let outcome = match step.status {
                concierge_core::StepStatus::Succeeded => "succeeded",
                concierge_core::StepStatus::Failed { .. } => "failed",
                _ => "skipped",
            };
            self.metrics.record_step(&step.tool, outcome, step.duration_ms);
        }

        let outcome = if report.fully_succeeded() {
            PipelineOutcome::Success
        } else {
            PipelineOutcome::PartialFailure
        };
        (report.synthesize_answer(), outcome, report.traces())
    }
}

fn clarification_answer(detail: &str) -> String {
    format!(
        "I need a bit more information before I can do that safely ({detail}). \
         Could you rephrase or be more specific?"
    )
}
