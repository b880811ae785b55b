//! The durable tier: system of record for sessions and turns.

use concierge_core::{ConversationId, ConversationTurn, SessionId, SessionRecord, StateError};

/// Asynchronous interface to the durable store.
///
/// The durable tier is authoritative: a value absent here does not exist,
/// no matter what the cache says. Implementations must be safe to share
/// across concurrent request pipelines.
#[async_trait::async_trait]
pub trait DurableStore: Send + Sync {
    /// Insert or replace a session record.
    async fn put_session(&self, session: &SessionRecord) -> Result<(), StateError>;

    /// Fetch a session by id.
    async fn get_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, StateError>;

    /// Mark a session revoked. Succeeds even if already revoked.
    async fn revoke_session(&self, id: &SessionId) -> Result<(), StateError>;

    /// Append one turn to a conversation.
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), StateError>;

    /// Fetch the most recent `limit` turns of a conversation, oldest first.
    async fn recent_turns(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StateError>;
}
