//! The standard tool set: calendar, email, and knowledge lookup.
//!
//! Destructive tools declare preconditions on their matching lookup tool,
//! so the validator can guarantee a deletion never runs without an earlier
//! step that resolved the concrete target identifier.

use serde_json::json;

use concierge_core::{FieldKind, FieldSpec, Precondition, ToolDescriptor, ToolName};

fn name(raw: &str) -> ToolName {
    // Names here are compile-time constants that satisfy TOOL_NAME rules.
    ToolName::parse(raw).unwrap_or_else(|e| panic!("invalid builtin tool name '{raw}': {e}"))
}

/// `get_events`: list calendar events in a lookback/lookahead window.
///
/// Output items carry an `id` field that destructive calendar tools bind to.
pub fn get_events() -> ToolDescriptor {
    ToolDescriptor {
        name: name("get_events"),
        description: "List calendar events. Optional 'window' like '7d' bounds the search. \
                      Each returned event has an 'id' field."
            .to_string(),
        fields: vec![
            FieldSpec::optional("window", FieldKind::String),
            FieldSpec::optional("query", FieldKind::String),
        ],
        precondition: None,
        repair_args: [("window".to_string(), json!("7d"))].into_iter().collect(),
    }
}

/// `create_event`: add a calendar event.
pub fn create_event() -> ToolDescriptor {
    ToolDescriptor {
        name: name("create_event"),
        description: "Create a calendar event with a title and an ISO-8601 start time.".to_string(),
        fields: vec![
            FieldSpec::required("title", FieldKind::String),
            FieldSpec::required("start", FieldKind::String),
            FieldSpec::optional("duration_minutes", FieldKind::Integer),
        ],
        precondition: None,
        repair_args: Default::default(),
    }
}

/// `delete_event`: remove a calendar event by identifier.
///
/// Requires a prior `get_events` step whose output `id` is bound to
/// `event_id`.
pub fn delete_event() -> ToolDescriptor {
    ToolDescriptor {
        name: name("delete_event"),
        description: "Delete the calendar event whose id was returned by get_events.".to_string(),
        fields: vec![FieldSpec::required("event_id", FieldKind::String)],
        precondition: Some(Precondition {
            requires_tool: name("get_events"),
            provides_field: "id".to_string(),
            binds_to: "event_id".to_string(),
        }),
        repair_args: Default::default(),
    }
}

/// `get_emails`: list recent emails.
pub fn get_emails() -> ToolDescriptor {
    ToolDescriptor {
        name: name("get_emails"),
        description: "List recent emails. Each returned email has an 'id' field.".to_string(),
        fields: vec![
            FieldSpec::optional("folder", FieldKind::String),
            FieldSpec::optional("limit", FieldKind::Integer),
        ],
        precondition: None,
        repair_args: [("limit".to_string(), json!(20))].into_iter().collect(),
    }
}

/// `send_email`: send an email.
pub fn send_email() -> ToolDescriptor {
    ToolDescriptor {
        name: name("send_email"),
        description: "Send an email to a recipient address.".to_string(),
        fields: vec![
            FieldSpec::required("to", FieldKind::String),
            FieldSpec::required("subject", FieldKind::String),
            FieldSpec::required("body", FieldKind::String),
        ],
        precondition: None,
        repair_args: Default::default(),
    }
}

/// `delete_email`: remove an email by identifier.
///
/// Requires a prior `get_emails` step whose output `id` is bound to
/// `email_id`.
pub fn delete_email() -> ToolDescriptor {
    ToolDescriptor {
        name: name("delete_email"),
        description: "Delete the email whose id was returned by get_emails.".to_string(),
        fields: vec![FieldSpec::required("email_id", FieldKind::String)],
        precondition: Some(Precondition {
            requires_tool: name("get_emails"),
            provides_field: "id".to_string(),
            binds_to: "email_id".to_string(),
        }),
        repair_args: Default::default(),
    }
}

/// `knowledge_search`: ranked text snippets for a free-text query.
pub fn knowledge_search() -> ToolDescriptor {
    ToolDescriptor {
        name: name("knowledge_search"),
        description: "Search the knowledge base; returns ranked text snippets.".to_string(),
        fields: vec![
            FieldSpec::required("query", FieldKind::String),
            FieldSpec::optional("top_k", FieldKind::Integer),
        ],
        precondition: None,
        repair_args: Default::default(),
    }
}

/// All standard descriptors.
pub fn all() -> Vec<ToolDescriptor> {
    vec![
        get_events(),
        create_event(),
        delete_event(),
        get_emails(),
        send_email(),
        delete_email(),
        knowledge_search(),
    ]
}
