//! Plan execution.
//!
//! The executor only accepts a [`ValidatedPlan`], resolves each step's
//! bindings from earlier results, invokes the tool collaborators, and
//! assembles the final answer. A step failure is local: independent
//! sibling steps continue, and only steps that bind to the failed one are
//! skipped. The answer never reports a destructive action as done without
//! a confirmed success outcome from its collaborator.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use concierge_core::{
    InvocationOutcome, PlanStep, StepArg, StepStatus, StepTrace, ToolCollaborator, ToolName,
};
use concierge_tools::ToolCatalog;

use crate::validator::ValidatedPlan;

/// Record of one settled step.
#[derive(Debug, Clone)]
pub struct ExecutedStep {
    pub tool: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    /// The collaborator's outcome, absent for steps that never ran.
    pub outcome: Option<InvocationOutcome>,
}

impl ExecutedStep {
    fn unran(tool: &str, status: StepStatus) -> Self {
        Self {
            tool: tool.to_string(),
            status,
            duration_ms: 0,
            outcome: None,
        }
    }
}

/// All settled steps of one plan, in plan order.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub steps: Vec<ExecutedStep>,
}

impl ExecutionReport {
    pub fn fully_succeeded(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s.status, StepStatus::Succeeded))
    }

    /// Per-step trace for the conversation turn metadata.
    pub fn traces(&self) -> Vec<StepTrace> {
        self.steps
            .iter()
            .map(|s| StepTrace {
                tool: s.tool.clone(),
                status: s.status.clone(),
                duration_ms: s.duration_ms,
            })
            .collect()
    }

    /// Assemble the user-facing answer.
    ///
    /// On partial failure every incomplete action is reported by name and
    /// reason; successes are still summarized.
    pub fn synthesize_answer(&self) -> String {
        let mut lines = Vec::new();
        for step in &self.steps {
            match &step.status {
                StepStatus::Succeeded => {
                    let summary = step
                        .outcome
                        .as_ref()
                        .and_then(|o| o.payload())
                        .map(summarize_payload)
                        .unwrap_or_default();
                    if summary.is_empty() {
                        lines.push(format!("{}: done.", step.tool));
                    } else {
                        lines.push(format!("{}: {summary}", step.tool));
                    }
                }
                StepStatus::Failed { message } => {
                    lines.push(format!("I couldn't complete {}: {message}", step.tool));
                }
                StepStatus::Skipped { reason } => {
                    lines.push(format!("{} was skipped: {reason}", step.tool));
                }
                StepStatus::Pending | StepStatus::Running => {
                    // Settled reports never contain these.
                    lines.push(format!("{}: did not settle.", step.tool));
                }
            }
        }
        lines.join("\n")
    }
}

fn summarize_payload(payload: &Value) -> String {
    let compact = payload.to_string();
    if compact.chars().count() > 200 {
        let truncated: String = compact.chars().take(200).collect();
        format!("{truncated}…")
    } else {
        compact
    }
}

/// Resolve a bound output field from a provider payload.
///
/// Lookup tools return result lists ordered most-relevant-first, so a list
/// payload resolves through its first element.
fn resolve_field<'v>(payload: &'v Value, field: &str) -> Option<&'v Value> {
    match payload {
        Value::Array(items) => items.first().and_then(|item| item.get(field)),
        other => other.get(field),
    }
}

/// What to do with a step once its dependencies have settled.
enum Disposition {
    /// Invoke the collaborator with fully resolved arguments.
    Run(Arc<dyn ToolCollaborator>, Value),
    /// Settle without running.
    Settle(StepStatus),
}

/// Drives validated plans to completion against the catalog.
pub struct Executor {
    catalog: Arc<ToolCatalog>,
    max_inflight: usize,
}

impl Executor {
    pub fn new(catalog: Arc<ToolCatalog>, max_inflight: usize) -> Self {
        Self {
            catalog,
            max_inflight: max_inflight.max(1),
        }
    }

    /// Execute every step of the plan and settle them all.
    pub async fn execute(&self, plan: ValidatedPlan) -> ExecutionReport {
        let steps = plan.into_plan().steps;
        if self.max_inflight == 1 {
            self.execute_sequential(steps).await
        } else {
            self.execute_concurrent(steps).await
        }
    }

    /// Strict in-order execution, the default.
    async fn execute_sequential(&self, steps: Vec<PlanStep>) -> ExecutionReport {
        let mut settled: Vec<ExecutedStep> = Vec::with_capacity(steps.len());
        for step in &steps {
            let disposition = self.disposition(step, |i| settled.get(i));
            let executed = match disposition {
                Disposition::Settle(status) => ExecutedStep::unran(&step.tool, status),
                Disposition::Run(collaborator, args) => {
                    invoke_step(&step.tool, collaborator, args).await
                }
            };
            settled.push(executed);
        }
        ExecutionReport { steps: settled }
    }

    /// Wave-based execution: steps whose dependencies have settled run
    /// together, bounded by `max_inflight`. Results are keyed by step
    /// index, so the report (and the answer built from it) is order-stable
    /// regardless of completion order.
    async fn execute_concurrent(&self, steps: Vec<PlanStep>) -> ExecutionReport {
        let limiter = Arc::new(Semaphore::new(self.max_inflight));
        let mut settled: Vec<Option<ExecutedStep>> = steps.iter().map(|_| None).collect();

        loop {
            let ready: Vec<usize> = (0..steps.len())
                .filter(|&i| settled[i].is_none())
                .filter(|&i| {
                    steps[i]
                        .bindings()
                        .all(|(_, b)| settled[b.step].is_some())
                })
                .collect();
            if ready.is_empty() {
                break;
            }

            let mut wave = Vec::with_capacity(ready.len());
            for &i in &ready {
                let step = &steps[i];
                let disposition = self.disposition(step, |j| settled[j].as_ref());
                match disposition {
                    Disposition::Settle(status) => {
                        settled[i] = Some(ExecutedStep::unran(&step.tool, status));
                    }
                    Disposition::Run(collaborator, args) => {
                        let tool = step.tool.clone();
                        let limiter = Arc::clone(&limiter);
                        wave.push(async move {
                            // Closed only on shutdown; treat as a failure.
                            let _permit = limiter.acquire().await;
                            (i, invoke_step(&tool, collaborator, args).await)
                        });
                    }
                }
            }

            for (i, executed) in join_all(wave).await {
                settled[i] = Some(executed);
            }
        }

        ExecutionReport {
            steps: settled
                .into_iter()
                .map(|s| {
                    s.unwrap_or_else(|| {
                        // Unreachable for validated plans: bindings only
                        // point backwards, so every step becomes ready.
                        ExecutedStep::unran(
                            "unknown",
                            StepStatus::Failed {
                                message: "step never became ready".to_string(),
                            },
                        )
                    })
                })
                .collect(),
        }
    }

    /// Decide whether a step runs, and with which resolved arguments.
    fn disposition<'a, F>(&self, step: &PlanStep, settled: F) -> Disposition
    where
        F: Fn(usize) -> Option<&'a ExecutedStep>,
    {
        let mut resolved = Map::new();
        for (name, arg) in &step.args {
            match arg {
                StepArg::Literal(value) => {
                    resolved.insert(name.clone(), value.clone());
                }
                StepArg::Binding { bind } => {
                    let Some(provider) = settled(bind.step) else {
                        return Disposition::Settle(StepStatus::Failed {
                            message: format!("binding to unsettled step {}", bind.step),
                        });
                    };
                    match &provider.status {
                        StepStatus::Succeeded => {}
                        StepStatus::Failed { .. } => {
                            return Disposition::Settle(StepStatus::Skipped {
                                reason: format!(
                                    "depends on step {} ({}), which failed",
                                    bind.step, provider.tool
                                ),
                            });
                        }
                        _ => {
                            return Disposition::Settle(StepStatus::Skipped {
                                reason: format!(
                                    "depends on step {} ({}), which did not run",
                                    bind.step, provider.tool
                                ),
                            });
                        }
                    }
                    let bound = provider
                        .outcome
                        .as_ref()
                        .and_then(|o| o.payload())
                        .and_then(|p| resolve_field(p, &bind.field));
                    match bound {
                        Some(value) => {
                            resolved.insert(name.clone(), value.clone());
                        }
                        None => {
                            return Disposition::Settle(StepStatus::Failed {
                                message: format!(
                                    "step {} ({}) produced no field '{}'",
                                    bind.step, provider.tool, bind.field
                                ),
                            });
                        }
                    }
                }
            }
        }

        let collaborator = ToolName::parse(&step.tool)
            .ok()
            .and_then(|name| self.catalog.collaborator(&name));
        match collaborator {
            Some(collaborator) => Disposition::Run(collaborator, Value::Object(resolved)),
            None => Disposition::Settle(StepStatus::Failed {
                message: format!("no collaborator registered for '{}'", step.tool),
            }),
        }
    }
}

async fn invoke_step(
    tool: &str,
    collaborator: Arc<dyn ToolCollaborator>,
    args: Value,
) -> ExecutedStep {
    let started = Instant::now();
    debug!(%tool, "invoking collaborator");
    let outcome = collaborator.invoke(args).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let status = match &outcome {
        InvocationOutcome::Success { .. } => StepStatus::Succeeded,
        InvocationOutcome::Failure { kind, message } => {
            warn!(%tool, %kind, %message, "step failed");
            StepStatus::Failed {
                message: format!("{kind}: {message}"),
            }
        }
    };

    ExecutedStep {
        tool: tool.to_string(),
        status,
        duration_ms,
        outcome: Some(outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::validate;
    use concierge_core::{InvocationErrorKind, Plan};
    use concierge_testing::MockCollaborator;
    use concierge_tools::standard;
    use serde_json::json;

    fn delete_after_lookup(
        lookup: MockCollaborator,
        delete: MockCollaborator,
    ) -> (Arc<ToolCatalog>, ValidatedPlan) {
        let catalog = Arc::new(
            ToolCatalog::new()
                .with_tool(standard::get_events(), Arc::new(lookup))
                .with_tool(standard::delete_event(), Arc::new(delete)),
        );
        let plan = validate(
            Plan::new(vec![
                PlanStep::new("get_events"),
                PlanStep::new("delete_event").with_arg("event_id", StepArg::binding(0, "id")),
            ]),
            &catalog,
        )
        .unwrap();
        (catalog, plan)
    }

    #[tokio::test]
    async fn dependent_step_is_skipped_when_provider_fails() {
        let lookup = MockCollaborator::new()
            .with_default_failure(InvocationErrorKind::Transient, "upstream 503");
        let delete = MockCollaborator::new();
        let (catalog, plan) = delete_after_lookup(lookup, delete.clone());

        let report = Executor::new(catalog, 1).execute(plan).await;
        assert!(matches!(report.steps[0].status, StepStatus::Failed { .. }));
        assert!(matches!(report.steps[1].status, StepStatus::Skipped { .. }));
        assert_eq!(delete.call_count(), 0);
        assert!(!report.fully_succeeded());
    }

    #[tokio::test]
    async fn list_payload_binds_through_first_element() {
        let lookup = MockCollaborator::new()
            .with_default_payload(json!([{"id": "evt-7"}, {"id": "evt-8"}]));
        let delete = MockCollaborator::new();
        let (catalog, plan) = delete_after_lookup(lookup, delete.clone());

        let report = Executor::new(catalog, 1).execute(plan).await;
        assert!(report.fully_succeeded());
        assert!(delete.was_called_with("event_id", &json!("evt-7")));
    }

    #[tokio::test]
    async fn missing_bound_field_fails_the_dependent_step() {
        let lookup = MockCollaborator::new().with_default_payload(json!([]));
        let delete = MockCollaborator::new();
        let (catalog, plan) = delete_after_lookup(lookup, delete.clone());

        let report = Executor::new(catalog, 1).execute(plan).await;
        assert!(matches!(report.steps[0].status, StepStatus::Succeeded));
        assert!(matches!(report.steps[1].status, StepStatus::Failed { .. }));
        assert_eq!(delete.call_count(), 0);
        // The answer never claims the deletion happened.
        assert!(report.synthesize_answer().contains("couldn't complete delete_event"));
    }
}
