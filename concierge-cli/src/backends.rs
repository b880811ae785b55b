//! Self-contained demo backends for local sessions.
//!
//! These keep their state in process memory so the full pipeline can run
//! without any external calendar or mail provider. Identifiers are stable
//! within one run, which is all the binding mechanism needs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use concierge_core::{InvocationErrorKind, InvocationOutcome, ToolCollaborator};

const SNIPPETS: &[(&str, &str)] = &[
    ("expense policy", "Expenses under $50 need no receipt; everything else does."),
    ("vacation policy", "Vacation requests go to your manager at least two weeks ahead."),
    ("meeting rooms", "Rooms are booked through the calendar; recurring holds expire monthly."),
];

struct WorldState {
    events: Mutex<Vec<Value>>,
    emails: Mutex<Vec<Value>>,
    next_id: AtomicU64,
}

impl WorldState {
    fn seeded() -> Self {
        Self {
            events: Mutex::new(vec![
                json!({"id": "evt-1", "title": "Team standup", "start": "2026-08-31T09:30:00Z"}),
                json!({"id": "evt-2", "title": "1:1 with Sam", "start": "2026-09-01T14:00:00Z"}),
            ]),
            emails: Mutex::new(vec![
                json!({"id": "eml-1", "from": "sam@example.com", "subject": "Weekly report"}),
                json!({"id": "eml-2", "from": "it@example.com", "subject": "Password expiry"}),
            ]),
            next_id: AtomicU64::new(3),
        }
    }

    fn fresh_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

enum Op {
    GetEvents,
    CreateEvent,
    DeleteEvent,
    GetEmails,
    SendEmail,
    DeleteEmail,
    KnowledgeSearch,
}

struct DemoCollaborator {
    op: Op,
    world: Arc<WorldState>,
}

fn remove_by_id(list: &Mutex<Vec<Value>>, id: &Value) -> bool {
    let mut list = list.lock().unwrap_or_else(|p| p.into_inner());
    let before = list.len();
    list.retain(|item| item.get("id") != Some(id));
    list.len() < before
}

#[async_trait]
impl ToolCollaborator for DemoCollaborator {
    async fn invoke(&self, args: Value) -> InvocationOutcome {
        match self.op {
            Op::GetEvents => {
                let events = self.world.events.lock().unwrap_or_else(|p| p.into_inner());
                InvocationOutcome::success(json!(*events))
            }
            Op::CreateEvent => {
                let id = self.world.fresh_id("evt");
                let event = json!({
                    "id": id,
                    "title": args.get("title").cloned().unwrap_or(Value::Null),
                    "start": args.get("start").cloned().unwrap_or(Value::Null),
                });
                self.world
                    .events
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push(event.clone());
                InvocationOutcome::success(event)
            }
            Op::DeleteEvent => match args.get("event_id") {
                Some(id) if remove_by_id(&self.world.events, id) => {
                    InvocationOutcome::success(json!({"deleted": id}))
                }
                Some(id) => InvocationOutcome::failure(
                    InvocationErrorKind::NotFound,
                    format!("no event with id {id}"),
                ),
                None => InvocationOutcome::failure(
                    InvocationErrorKind::InvalidInput,
                    "event_id is required",
                ),
            },
            Op::GetEmails => {
                let emails = self.world.emails.lock().unwrap_or_else(|p| p.into_inner());
                InvocationOutcome::success(json!(*emails))
            }
            Op::SendEmail => InvocationOutcome::success(json!({
                "sent": true,
                "to": args.get("to").cloned().unwrap_or(Value::Null),
            })),
            Op::DeleteEmail => match args.get("email_id") {
                Some(id) if remove_by_id(&self.world.emails, id) => {
                    InvocationOutcome::success(json!({"deleted": id}))
                }
                Some(id) => InvocationOutcome::failure(
                    InvocationErrorKind::NotFound,
                    format!("no email with id {id}"),
                ),
                None => InvocationOutcome::failure(
                    InvocationErrorKind::InvalidInput,
                    "email_id is required",
                ),
            },
            Op::KnowledgeSearch => {
                let needle = args
                    .get("query")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_lowercase();
                let hits: Vec<Value> = SNIPPETS
                    .iter()
                    .filter(|(topic, _)| needle.is_empty() || topic.contains(&needle))
                    .map(|(topic, text)| json!({"topic": topic, "snippet": text}))
                    .collect();
                InvocationOutcome::success(json!(hits))
            }
        }
    }
}

/// Build the full standard catalog over one shared in-memory world.
pub fn demo_catalog() -> concierge_tools::ToolCatalog {
    let world = Arc::new(WorldState::seeded());
    let collaborator = |op: Op| -> Arc<dyn ToolCollaborator> {
        Arc::new(DemoCollaborator {
            op,
            world: Arc::clone(&world),
        })
    };

    concierge_tools::ToolCatalog::new()
        .with_tool(concierge_tools::standard::get_events(), collaborator(Op::GetEvents))
        .with_tool(concierge_tools::standard::create_event(), collaborator(Op::CreateEvent))
        .with_tool(concierge_tools::standard::delete_event(), collaborator(Op::DeleteEvent))
        .with_tool(concierge_tools::standard::get_emails(), collaborator(Op::GetEmails))
        .with_tool(concierge_tools::standard::send_email(), collaborator(Op::SendEmail))
        .with_tool(concierge_tools::standard::delete_email(), collaborator(Op::DeleteEmail))
        .with_tool(
            concierge_tools::standard::knowledge_search(),
            collaborator(Op::KnowledgeSearch),
        )
}
