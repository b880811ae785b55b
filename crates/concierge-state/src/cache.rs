//! The cache tier: a disposable read accelerator.
//!
//! Cache entries are JSON strings with per-write TTLs. Absence of a cache
//! entry never means "does not exist"; it only means the durable tier must
//! be consulted.

use std::time::Duration;

use concierge_core::{ConversationId, SessionId, StateError};

/// Asynchronous interface to the cache tier.
#[async_trait::async_trait]
pub trait CacheTier: Send + Sync {
    /// Fetch a cached value, or `None` on a miss or expired entry.
    async fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    /// Store a value with a time-to-live.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StateError>;

    /// Remove a value. Succeeds if the key was already absent.
    async fn delete(&self, key: &str) -> Result<(), StateError>;
}

/// Cache key for a session record.
pub fn session_key(id: &SessionId) -> String {
    format!("session:{id}")
}

/// Cache key for a conversation's recent-turn window.
pub fn turns_key(id: &ConversationId) -> String {
    format!("turns:{id}")
}
