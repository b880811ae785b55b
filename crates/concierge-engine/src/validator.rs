//! Deterministic plan validation.
//!
//! The validator is the only component trusted to authorize execution.
//! It is a pure function over a candidate plan and the tool catalog, run
//! in a fixed order:
//!
//! 1. every tool name exists in the catalog;
//! 2. every required argument is present (as a literal of the declared
//!    type, or as a binding);
//! 3. every declared precondition has a qualifying earlier step; where it
//!    does not, and the named lookup tool can be inserted with its fixed
//!    system-default arguments, exactly one repair step is inserted
//!    immediately before the dependent step;
//! 4. no remaining binding references its own step or a later one.
//!
//! A plan that fails after the single repair attempt is rejected outright;
//! no step of a rejected plan ever executes.

use std::collections::BTreeMap;

use serde_json::Value;

use concierge_core::{Plan, PlanStep, PlanViolation, StepArg};
use concierge_tools::ToolCatalog;

/// A plan that passed validation.
///
/// The field is private so the only way to obtain one is through
/// [`validate`]; the executor accepts nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    plan: Plan,
}

impl ValidatedPlan {
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn into_plan(self) -> Plan {
        self.plan
    }
}

/// Repair to apply while rebuilding the step list: insert `tool` with its
/// default args directly before the dependent step and bind `binds_to` to
/// the new step's `provides_field`.
struct Repair {
    tool: String,
    args: BTreeMap<String, Value>,
    provides_field: String,
    binds_to: String,
}

/// Validate a candidate plan against the catalog.
pub fn validate(raw: Plan, catalog: &ToolCatalog) -> Result<ValidatedPlan, PlanViolation> {
    // Check 1: unknown tools.
    for (i, step) in raw.steps.iter().enumerate() {
        if !catalog.contains(&step.tool) {
            return Err(PlanViolation::UnknownTool {
                step: i,
                tool: step.tool.clone(),
            });
        }
    }

    // Check 2: required arguments, with literals matching their declared
    // type. A wrong-typed literal counts as missing.
    for (i, step) in raw.steps.iter().enumerate() {
        let Some(descriptor) = catalog.descriptor(&step.tool) else {
            continue;
        };
        for field in descriptor.required_fields() {
            let present = match step.args.get(&field.name) {
                Some(StepArg::Literal(value)) => field.kind.matches(value),
                Some(StepArg::Binding { .. }) => true,
                None => false,
            };
            if !present {
                return Err(PlanViolation::MissingArgument {
                    step: i,
                    tool: step.tool.clone(),
                    field: field.name.clone(),
                });
            }
        }
    }

    // Check 3: preconditions, evaluated against original step indices.
    let mut repairs: Vec<Option<Repair>> = Vec::with_capacity(raw.steps.len());
    for (i, step) in raw.steps.iter().enumerate() {
        let precondition = catalog
            .descriptor(&step.tool)
            .and_then(|d| d.precondition.clone());
        let Some(pre) = precondition else {
            repairs.push(None);
            continue;
        };

        let satisfied = step
            .args
            .get(&pre.binds_to)
            .and_then(StepArg::as_binding)
            .is_some_and(|b| {
                b.step < i
                    && b.field == pre.provides_field
                    && raw.steps[b.step].tool == pre.requires_tool.as_str()
            });
        if satisfied {
            repairs.push(None);
            continue;
        }

        // Repairable only when the lookup tool is registered and can run
        // on its system defaults alone.
        let unmet = || PlanViolation::PreconditionUnmet {
            step: i,
            tool: step.tool.clone(),
            requires: pre.requires_tool.as_str().to_string(),
            field: pre.provides_field.clone(),
        };
        let Some(lookup) = catalog.descriptor(pre.requires_tool.as_str()) else {
            return Err(unmet());
        };
        let self_sufficient = lookup
            .required_fields()
            .all(|f| lookup.repair_args.contains_key(&f.name));
        if !self_sufficient {
            return Err(unmet());
        }

        repairs.push(Some(Repair {
            tool: lookup.name.as_str().to_string(),
            args: lookup.repair_args.clone(),
            provides_field: pre.provides_field,
            binds_to: pre.binds_to,
        }));
    }

    // Check 4 + rebuild: reject forward/self references, apply repairs,
    // and remap binding indices to the rebuilt positions.
    let step_count = raw.steps.len();
    let mut out: Vec<PlanStep> = Vec::with_capacity(step_count);
    let mut remap: Vec<usize> = Vec::with_capacity(step_count);

    for (i, mut step) in raw.steps.into_iter().enumerate() {
        let repair = repairs[i].take();
        let replaced_arg = repair.as_ref().map(|r| r.binds_to.clone());

        for (name, binding) in step.bindings() {
            // The argument a repair will overwrite is exempt; everything
            // else must point strictly backwards.
            if replaced_arg.as_deref() == Some(name) {
                continue;
            }
            if binding.step >= i {
                return Err(PlanViolation::ForwardBinding {
                    step: i,
                    target: binding.step,
                });
            }
        }

        for (name, arg) in step.args.iter_mut() {
            if replaced_arg.as_deref() == Some(name.as_str()) {
                continue;
            }
            if let StepArg::Binding { bind } = arg {
                bind.step = remap[bind.step];
            }
        }

        if let Some(repair) = repair {
            let inserted_at = out.len();
            let mut lookup = PlanStep::new(&repair.tool);
            for (field, value) in repair.args {
                lookup.args.insert(field, StepArg::Literal(value));
            }
            out.push(lookup);
            step.args.insert(
                repair.binds_to,
                StepArg::binding(inserted_at, &repair.provides_field),
            );
        }

        remap.push(out.len());
        out.push(step);
    }

    Ok(ValidatedPlan {
        plan: Plan::new(out),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::{InvocationOutcome, ToolCollaborator};
    use concierge_tools::standard;
    use serde_json::json;
    use std::sync::Arc;

    struct NullCollaborator;

    #[async_trait::async_trait]
    impl ToolCollaborator for NullCollaborator {
        async fn invoke(&self, _args: Value) -> InvocationOutcome {
            InvocationOutcome::success(json!({}))
        }
    }

    fn catalog() -> ToolCatalog {
        standard::all()
            .into_iter()
            .fold(ToolCatalog::new(), |c, d| {
                c.with_tool(d, Arc::new(NullCollaborator))
            })
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let plan = Plan::new(vec![PlanStep::new("teleport_user")]);
        let err = validate(plan, &catalog()).unwrap_err();
        assert!(matches!(err, PlanViolation::UnknownTool { step: 0, .. }));
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let plan = Plan::new(vec![
            PlanStep::new("send_email").with_arg("to", StepArg::literal(json!("a@b.example"))),
        ]);
        let err = validate(plan, &catalog()).unwrap_err();
        assert!(matches!(
            err,
            PlanViolation::MissingArgument { ref field, .. } if field == "subject"
        ));
    }

    #[test]
    fn wrong_typed_literal_counts_as_missing() {
        let plan = Plan::new(vec![
            PlanStep::new("send_email")
                .with_arg("to", StepArg::literal(json!(42)))
                .with_arg("subject", StepArg::literal(json!("hi")))
                .with_arg("body", StepArg::literal(json!("text"))),
        ]);
        let err = validate(plan, &catalog()).unwrap_err();
        assert!(matches!(
            err,
            PlanViolation::MissingArgument { ref field, .. } if field == "to"
        ));
    }

    #[test]
    fn bare_delete_gets_a_lookup_inserted() {
        // A lone delete bound to its own output.
        let plan = Plan::new(vec![
            PlanStep::new("delete_event").with_arg("event_id", StepArg::binding(0, "id")),
        ]);
        let validated = validate(plan, &catalog()).unwrap();
        let steps = &validated.plan().steps;

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].tool, "get_events");
        assert_eq!(steps[0].args.get("window"), Some(&StepArg::literal(json!("7d"))));
        assert_eq!(steps[1].tool, "delete_event");
        assert_eq!(steps[1].args.get("event_id"), Some(&StepArg::binding(0, "id")));
    }

    #[test]
    fn repair_uses_system_defaults() {
        let plan = Plan::new(vec![
            PlanStep::new("delete_email").with_arg("email_id", StepArg::literal(json!("em-9"))),
        ]);
        let validated = validate(plan, &catalog()).unwrap();
        let steps = &validated.plan().steps;

        assert_eq!(steps[0].tool, "get_emails");
        // Defaults come from the descriptor, never from the planner.
        assert_eq!(steps[0].args.get("limit"), Some(&StepArg::literal(json!(20))));
        assert_eq!(steps[1].args.get("email_id"), Some(&StepArg::binding(0, "id")));
    }

    #[test]
    fn satisfied_precondition_is_left_alone() {
        let plan = Plan::new(vec![
            PlanStep::new("get_events").with_arg("window", StepArg::literal(json!("1d"))),
            PlanStep::new("delete_event").with_arg("event_id", StepArg::binding(0, "id")),
        ]);
        let validated = validate(plan.clone(), &catalog()).unwrap();
        assert_eq!(validated.plan(), &plan);
    }

    #[test]
    fn validation_is_idempotent() {
        let plan = Plan::new(vec![
            PlanStep::new("delete_event").with_arg("event_id", StepArg::binding(0, "id")),
        ]);
        let once = validate(plan, &catalog()).unwrap();
        let twice = validate(once.plan().clone(), &catalog()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn forward_binding_is_rejected() {
        let plan = Plan::new(vec![
            PlanStep::new("get_events"),
            PlanStep::new("send_email")
                .with_arg("to", StepArg::literal(json!("a@b.example")))
                .with_arg("subject", StepArg::literal(json!("hi")))
                .with_arg("body", StepArg::binding(2, "snippet")),
            PlanStep::new("knowledge_search")
                .with_arg("query", StepArg::literal(json!("policy"))),
        ]);
        let err = validate(plan, &catalog()).unwrap_err();
        assert!(matches!(
            err,
            PlanViolation::ForwardBinding { step: 1, target: 2 }
        ));
    }

    #[test]
    fn self_binding_without_precondition_is_rejected() {
        let plan = Plan::new(vec![
            PlanStep::new("knowledge_search").with_arg("query", StepArg::binding(0, "snippet")),
        ]);
        let err = validate(plan, &catalog()).unwrap_err();
        assert!(matches!(
            err,
            PlanViolation::ForwardBinding { step: 0, target: 0 }
        ));
    }

    #[test]
    fn precondition_on_unregistered_lookup_is_unrepairable() {
        // Catalog without get_events: delete_event cannot be repaired.
        let catalog = ToolCatalog::new().with_tool(standard::delete_event(), Arc::new(NullCollaborator));
        let plan = Plan::new(vec![
            PlanStep::new("delete_event").with_arg("event_id", StepArg::binding(0, "id")),
        ]);
        let err = validate(plan, &catalog).unwrap_err();
        assert!(matches!(
            err,
            PlanViolation::PreconditionUnmet { ref requires, .. } if requires == "get_events"
        ));
    }

    #[test]
    fn repair_shifts_later_binding_indices() {
        // Step 1 binds to step 0; a repair inserted before step 2's delete
        // must not disturb that binding, and step 2's own binding must
        // point at the inserted lookup.
        let plan = Plan::new(vec![
            PlanStep::new("knowledge_search").with_arg("query", StepArg::literal(json!("q"))),
            PlanStep::new("send_email")
                .with_arg("to", StepArg::literal(json!("a@b.example")))
                .with_arg("subject", StepArg::literal(json!("hi")))
                .with_arg("body", StepArg::binding(0, "snippet")),
            PlanStep::new("delete_event").with_arg("event_id", StepArg::binding(2, "id")),
        ]);
        let validated = validate(plan, &catalog()).unwrap();
        let steps = &validated.plan().steps;

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[1].args.get("body"), Some(&StepArg::binding(0, "snippet")));
        assert_eq!(steps[2].tool, "get_events");
        assert_eq!(steps[3].args.get("event_id"), Some(&StepArg::binding(2, "id")));
    }
}
