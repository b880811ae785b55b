//! Session records and conversation turns.
//!
//! These are the two durable entities of the system. Sessions authorize
//! requests; turns are the append-only conversation history. Both are owned
//! exclusively by the State Manager: the durable tier is authoritative and
//! the cache tier only accelerates reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::{ConversationId, SessionId, UserId};
use crate::plan::StepStatus;

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl SessionRecord {
    /// Create a fresh session valid for `ttl` from now.
    pub fn new(id: SessionId, user_id: UserId, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            issued_at: now,
            expires_at: now + ttl,
            revoked: false,
        }
    }

    /// Whether this session is usable at `now`.
    ///
    /// A session past its expiry reads as revoked even if the revocation
    /// flag was never set.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Who authored a message within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One (role, text) pair inside a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: Role,
    pub text: String,
}

impl TurnMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Trace of one executed plan step, kept for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTrace {
    pub tool: String,
    pub status: StepStatus,
    pub duration_ms: u64,
}

/// Structured metadata attached to a finished turn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnMetadata {
    /// Category the intent router assigned to the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Per-step execution trace, empty for tool-free answers.
    #[serde(default)]
    pub steps: Vec<StepTrace>,
}

/// One append-only conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub conversation_id: ConversationId,
    pub messages: Vec<TurnMessage>,
    #[serde(default)]
    pub metadata: TurnMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a turn holding the user message and the assistant reply.
    pub fn new(
        conversation_id: ConversationId,
        messages: Vec<TurnMessage>,
        metadata: TurnMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            conversation_id,
            messages,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}
