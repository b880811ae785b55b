//! End-to-end pipeline runs over scripted planners and mock collaborators.

use std::sync::Arc;

use serde_json::json;

use concierge_core::{
    ConversationId, InvocationErrorKind, InvocationOutcome, StepStatus, UserId,
};
use concierge_engine::{
    EngineConfig, LlmPlanner, Pipeline, PipelineError, PipelineOutcome,
};
use concierge_state::{InMemoryCache, SqliteStore, StateConfig, StateManager};
use concierge_testing::{MockCollaborator, ScriptedLlm};
use concierge_tools::{ToolCatalog, standard};

struct Harness {
    pipeline: Pipeline,
    state: Arc<StateManager>,
    get_events: Arc<MockCollaborator>,
    get_emails: Arc<MockCollaborator>,
    send_email: Arc<MockCollaborator>,
    delete_event: Arc<MockCollaborator>,
}

fn harness(llm: ScriptedLlm, config: EngineConfig) -> Harness {
    let get_events = Arc::new(
        MockCollaborator::new()
            .with_default_payload(json!([{"id": "evt-1", "title": "standup"}])),
    );
    let get_emails = Arc::new(
        MockCollaborator::new()
            .with_default_payload(json!([{"id": "eml-1", "subject": "weekly report"}])),
    );
    let send_email = Arc::new(MockCollaborator::new().with_default_payload(json!({"sent": true})));
    let delete_event =
        Arc::new(MockCollaborator::new().with_default_payload(json!({"deleted": true})));

    let catalog = Arc::new(
        ToolCatalog::new()
            .with_tool(standard::get_events(), Arc::clone(&get_events) as _)
            .with_tool(standard::create_event(), Arc::new(MockCollaborator::new()))
            .with_tool(standard::delete_event(), Arc::clone(&delete_event) as _)
            .with_tool(standard::get_emails(), Arc::clone(&get_emails) as _)
            .with_tool(standard::send_email(), Arc::clone(&send_email) as _)
            .with_tool(standard::delete_email(), Arc::new(MockCollaborator::new()))
            .with_tool(
                standard::knowledge_search(),
                Arc::new(MockCollaborator::new().with_default_payload(json!([]))),
            ),
    );

    let state = Arc::new(StateManager::new(
        Arc::new(SqliteStore::in_memory().unwrap()),
        Arc::new(InMemoryCache::new()),
        StateConfig::default(),
    ));
    let planner = Arc::new(LlmPlanner::new(llm, config.clone()));
    let pipeline = Pipeline::new(catalog, planner, Arc::clone(&state), config);

    Harness {
        pipeline,
        state,
        get_events,
        get_emails,
        send_email,
        delete_event,
    }
}

async fn active_session(h: &Harness) -> concierge_core::SessionId {
    h.state
        .create_session(UserId::parse("user-1").unwrap())
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn direct_answer_is_persisted_as_a_turn() {
    let h = harness(
        ScriptedLlm::replying(r#"{"answer": "Hello! How can I help?"}"#),
        EngineConfig::default(),
    );
    let session = active_session(&h).await;
    let conversation = ConversationId::generate();

    let response = h
        .pipeline
        .handle(&session, &conversation, "hi there")
        .await
        .unwrap();

    assert_eq!(response.outcome, PipelineOutcome::Success);
    assert_eq!(response.answer, "Hello! How can I help?");
    assert!(response.traces.is_empty());

    let turns = h.state.get_recent_turns(&conversation, 10).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].messages.len(), 2);
    assert_eq!(turns[0].messages[1].text, "Hello! How can I help?");
}

#[tokio::test]
async fn independent_steps_both_reach_the_answer() {
    let plan = json!({
        "plan": {"steps": [
            {"tool": "get_events", "args": {"window": "1d"}},
            {"tool": "get_emails", "args": {"limit": 5}}
        ]}
    });
    let mut config = EngineConfig::default();
    config.max_inflight_steps = 2;
    let h = harness(ScriptedLlm::replying(plan.to_string()), config);
    let session = active_session(&h).await;

    let response = h
        .pipeline
        .handle(&session, &ConversationId::generate(), "what's on today, and any mail?")
        .await
        .unwrap();

    assert_eq!(response.outcome, PipelineOutcome::Success);
    assert_eq!(h.get_events.call_count(), 1);
    assert_eq!(h.get_emails.call_count(), 1);
    assert!(response.answer.contains("standup"));
    assert!(response.answer.contains("weekly report"));
    // Answer lines follow plan order regardless of completion order.
    let events_at = response.answer.find("get_events").unwrap();
    let emails_at = response.answer.find("get_emails").unwrap();
    assert!(events_at < emails_at);
}

#[tokio::test]
async fn failed_step_yields_partial_failure_without_losing_others() {
    let plan = json!({
        "plan": {"steps": [
            {"tool": "get_events", "args": {}},
            {"tool": "send_email", "args": {
                "to": "not-an-address", "subject": "hi", "body": "text"
            }}
        ]}
    });
    let h = harness(ScriptedLlm::replying(plan.to_string()), EngineConfig::default());
    let session = active_session(&h).await;

    // Replace the default success with a scripted invalid-input failure.
    let h = {
        let mut h = h;
        h.send_email = Arc::new(MockCollaborator::new().with_default_failure(
            InvocationErrorKind::InvalidInput,
            "recipient address is malformed",
        ));
        // Catalog already holds the old mock, so rebuild with the failing one.
        let catalog = Arc::new(
            ToolCatalog::new()
                .with_tool(standard::get_events(), Arc::clone(&h.get_events) as _)
                .with_tool(standard::send_email(), Arc::clone(&h.send_email) as _),
        );
        let planner = Arc::new(LlmPlanner::new(
            ScriptedLlm::replying(plan.to_string()),
            EngineConfig::default(),
        ));
        h.pipeline = Pipeline::new(
            catalog,
            planner,
            Arc::clone(&h.state),
            EngineConfig::default(),
        );
        h
    };

    let response = h
        .pipeline
        .handle(&session, &ConversationId::generate(), "mail my schedule to bob")
        .await
        .unwrap();

    assert_eq!(response.outcome, PipelineOutcome::PartialFailure);
    assert_eq!(response.traces.len(), 2);
    assert_eq!(response.traces[0].status, StepStatus::Succeeded);
    assert!(matches!(response.traces[1].status, StepStatus::Failed { .. }));
    assert!(response.answer.contains("recipient address is malformed"));
    assert!(response.answer.contains("standup"));
}

#[tokio::test]
async fn bare_deletion_gets_a_lookup_inserted_and_bound() {
    let plan = json!({
        "plan": {"steps": [
            {"tool": "delete_event", "args": {
                "event_id": {"$bind": {"step": 0, "field": "id"}}
            }}
        ]}
    });
    let h = harness(ScriptedLlm::replying(plan.to_string()), EngineConfig::default());
    let session = active_session(&h).await;

    let response = h
        .pipeline
        .handle(&session, &ConversationId::generate(), "cancel my standup")
        .await
        .unwrap();

    assert_eq!(response.outcome, PipelineOutcome::Success);
    assert_eq!(response.traces.len(), 2);
    assert_eq!(response.traces[0].tool, "get_events");
    assert_eq!(response.traces[1].tool, "delete_event");
    // The repair lookup ran with its fixed defaults, and the deletion
    // received the id the lookup produced.
    assert!(h.get_events.was_called_with("window", &json!("7d")));
    assert!(h.delete_event.was_called_with("event_id", &json!("evt-1")));
}

#[tokio::test]
async fn rejected_plan_asks_for_clarification_and_runs_nothing() {
    let plan = json!({
        "plan": {"steps": [{"tool": "format_disk", "args": {}}]}
    });
    let h = harness(ScriptedLlm::replying(plan.to_string()), EngineConfig::default());
    let session = active_session(&h).await;
    let conversation = ConversationId::generate();

    let response = h
        .pipeline
        .handle(&session, &conversation, "clean up my drive")
        .await
        .unwrap();

    assert_eq!(response.outcome, PipelineOutcome::PlanRejected);
    assert!(response.traces.is_empty());
    assert_eq!(h.get_events.call_count(), 0);
    assert_eq!(h.send_email.call_count(), 0);

    // The rejected exchange is still part of the history.
    let turns = h.state.get_recent_turns(&conversation, 10).await.unwrap();
    assert_eq!(turns.len(), 1);
}

#[tokio::test]
async fn planner_outage_produces_fixed_fallback() {
    let h = harness(
        ScriptedLlm::new().with_unreachable("connection refused"),
        EngineConfig::default(),
    );
    let session = active_session(&h).await;

    let response = h
        .pipeline
        .handle(&session, &ConversationId::generate(), "schedule lunch tomorrow")
        .await
        .unwrap();

    assert_eq!(response.outcome, PipelineOutcome::PlannerUnavailable);
    assert!(response.answer.contains("try again"));
    assert_eq!(h.get_events.call_count(), 0);
}

#[tokio::test]
async fn unsupported_intent_never_reaches_the_planner() {
    let llm = ScriptedLlm::replying(r#"{"answer": "should not be used"}"#);
    let h = harness(llm, EngineConfig::default());
    let session = active_session(&h).await;

    let response = h
        .pipeline
        .handle(&session, &ConversationId::generate(), "play music for me")
        .await
        .unwrap();

    assert_eq!(response.category, "unsupported");
    assert!(response.answer.contains("calendar"));
    assert_ne!(response.answer, "should not be used");
}

#[tokio::test]
async fn inactive_session_is_refused() {
    let h = harness(
        ScriptedLlm::replying(r#"{"answer": "ok"}"#),
        EngineConfig::default(),
    );
    let session = active_session(&h).await;
    h.state.invalidate_session(&session).await.unwrap();

    let err = h
        .pipeline
        .handle(&session, &ConversationId::generate(), "hi")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SessionNotActive(_)));
}

#[tokio::test]
async fn slow_collaborator_trips_the_request_timeout() {
    struct SlowCollaborator;

    #[async_trait::async_trait]
    impl concierge_core::ToolCollaborator for SlowCollaborator {
        async fn invoke(&self, _args: serde_json::Value) -> InvocationOutcome {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            InvocationOutcome::success(json!([]))
        }
    }

    let catalog = Arc::new(
        ToolCatalog::new().with_tool(standard::get_events(), Arc::new(SlowCollaborator)),
    );
    let state = Arc::new(StateManager::new(
        Arc::new(SqliteStore::in_memory().unwrap()),
        Arc::new(InMemoryCache::new()),
        StateConfig::default(),
    ));
    let plan = json!({"plan": {"steps": [{"tool": "get_events", "args": {}}]}});
    let mut config = EngineConfig::default();
    config.request_timeout_secs = 1;
    let planner = Arc::new(LlmPlanner::new(
        ScriptedLlm::replying(plan.to_string()),
        config.clone(),
    ));
    let pipeline = Pipeline::new(catalog, planner, Arc::clone(&state), config);
    let session = state
        .create_session(UserId::parse("user-1").unwrap())
        .await
        .unwrap()
        .id;

    let err = pipeline
        .handle(&session, &ConversationId::generate(), "what's on?")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Timeout));
}
