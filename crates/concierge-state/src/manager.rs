//! The State Manager: dual-write, read-through coordination of the two
//! tiers.
//!
//! Every write goes to the durable tier first; the matching cache write is
//! best-effort and only logged on failure. Every read tries the cache
//! first and falls back to the durable tier, repopulating the cache on the
//! way out. The durable tier is never behind the cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use concierge_core::{
    ConversationId, ConversationTurn, SessionId, SessionRecord, StateError, UserId,
};

use crate::cache::{CacheTier, session_key, turns_key};
use crate::durable::DurableStore;

/// Tunables for the State Manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Lifetime of newly created sessions, in seconds.
    pub session_lifetime_secs: u64,
    /// Cache TTL for session records, in seconds. Sessions churn slowly,
    /// so this is long.
    pub session_cache_ttl_secs: u64,
    /// Cache TTL for the recent-turn window, in seconds. Turns churn fast,
    /// so this is short.
    pub turn_cache_ttl_secs: u64,
    /// How many turns the cached window holds.
    pub turn_cache_window: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            session_lifetime_secs: 24 * 60 * 60,
            session_cache_ttl_secs: 30 * 60,
            turn_cache_ttl_secs: 60,
            turn_cache_window: 20,
        }
    }
}

impl StateConfig {
    pub fn session_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.session_cache_ttl_secs)
    }

    pub fn turn_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.turn_cache_ttl_secs)
    }
}

/// Two-tier store for sessions and conversation turns.
pub struct StateManager {
    durable: Arc<dyn DurableStore>,
    cache: Arc<dyn CacheTier>,
    config: StateConfig,
}

impl StateManager {
    pub fn new(
        durable: Arc<dyn DurableStore>,
        cache: Arc<dyn CacheTier>,
        config: StateConfig,
    ) -> Self {
        Self {
            durable,
            cache,
            config,
        }
    }

    /// Create a session for `user_id` and persist it to both tiers.
    pub async fn create_session(&self, user_id: UserId) -> Result<SessionRecord, StateError> {
        let session = SessionRecord::new(
            SessionId::generate(),
            user_id,
            chrono::Duration::seconds(self.config.session_lifetime_secs as i64),
        );

        self.durable.put_session(&session).await?;
        self.cache_session(&session).await;
        debug!(session_id = %session.id, "session created");
        Ok(session)
    }

    /// Fetch a session, cache tier first.
    ///
    /// Expired sessions are returned with their stored state; callers
    /// decide usability via [`SessionRecord::is_active`].
    pub async fn get_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, StateError> {
        let key = session_key(id);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<SessionRecord>(&raw) {
                Ok(session) => return Ok(Some(session)),
                Err(error) => {
                    // A corrupt cache entry is treated as a miss.
                    warn!(%key, %error, "dropping undecodable cache entry");
                    let _ = self.cache.delete(&key).await;
                }
            },
            Ok(None) => {}
            Err(error) => warn!(%key, %error, "cache read failed, falling through"),
        }

        let session = self.durable.get_session(id).await?;
        if let Some(session) = &session {
            self.cache_session(session).await;
        }
        Ok(session)
    }

    /// Revoke a session in both tiers.
    ///
    /// The durable revocation commits first and is the point of no return;
    /// the cache entry is then deleted so no read can resurrect the
    /// session past its cache TTL. A cache-delete failure is surfaced so
    /// the caller can retry the invalidation.
    pub async fn invalidate_session(&self, id: &SessionId) -> Result<(), StateError> {
        self.durable.revoke_session(id).await?;
        self.cache.delete(&session_key(id)).await?;
        debug!(session_id = %id, "session invalidated");
        Ok(())
    }

    /// Append a finished turn to its conversation.
    ///
    /// Durable append first; on success the cached recent-turn window is
    /// rewritten from the durable tier so a warm cache stays exact. On a
    /// durable failure the cache window is dropped so it cannot contain a
    /// turn the durable tier never saw.
    pub async fn save_turn(&self, turn: &ConversationTurn) -> Result<(), StateError> {
        let key = turns_key(&turn.conversation_id);

        if let Err(error) = self.durable.append_turn(turn).await {
            let _ = self.cache.delete(&key).await;
            return Err(error);
        }

        match self
            .durable
            .recent_turns(&turn.conversation_id, self.config.turn_cache_window)
            .await
        {
            Ok(window) => match serde_json::to_string(&window) {
                Ok(raw) => {
                    if let Err(error) =
                        self.cache.set(&key, raw, self.config.turn_cache_ttl()).await
                    {
                        warn!(%key, %error, "cache write failed after save_turn");
                    }
                }
                Err(error) => warn!(%key, %error, "turn window failed to encode"),
            },
            Err(error) => {
                // Could not rebuild the window; make sure the stale one is gone.
                warn!(%key, %error, "turn window reload failed, dropping cache entry");
                let _ = self.cache.delete(&key).await;
            }
        }
        Ok(())
    }

    /// Fetch the most recent `limit` turns, oldest first.
    pub async fn get_recent_turns(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StateError> {
        let key = turns_key(conversation_id);
        let window_limit = limit.min(self.config.turn_cache_window);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ConversationTurn>>(&raw) {
                // The cached window can only answer requests it fully covers.
                Ok(window) if limit <= self.config.turn_cache_window => {
                    let skip = window.len().saturating_sub(window_limit);
                    return Ok(window.into_iter().skip(skip).collect());
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(%key, %error, "dropping undecodable cache entry");
                    let _ = self.cache.delete(&key).await;
                }
            },
            Ok(None) => {}
            Err(error) => warn!(%key, %error, "cache read failed, falling through"),
        }

        // Fetch at least a full window so the miss repopulates the cache
        // even when the caller asked for less.
        let fetch = limit.max(self.config.turn_cache_window);
        let turns = self.durable.recent_turns(conversation_id, fetch).await?;

        let tail_start = turns.len().saturating_sub(self.config.turn_cache_window);
        if let Ok(raw) = serde_json::to_string(&turns[tail_start..]) {
            if let Err(error) = self.cache.set(&key, raw, self.config.turn_cache_ttl()).await {
                warn!(%key, %error, "cache repopulation failed");
            }
        }

        let skip = turns.len().saturating_sub(limit);
        Ok(turns.into_iter().skip(skip).collect())
    }

    /// Check that a session exists, is unrevoked, and is unexpired.
    pub async fn require_active_session(
        &self,
        id: &SessionId,
    ) -> Result<Option<SessionRecord>, StateError> {
        let session = self.get_session(id).await?;
        Ok(session.filter(|s| s.is_active(Utc::now())))
    }

    async fn cache_session(&self, session: &SessionRecord) {
        let key = session_key(&session.id);
        match serde_json::to_string(session) {
            Ok(raw) => {
                if let Err(error) = self
                    .cache
                    .set(&key, raw, self.config.session_cache_ttl())
                    .await
                {
                    warn!(%key, %error, "cache write failed, durable tier remains authoritative");
                }
            }
            Err(error) => warn!(%key, %error, "session failed to encode for cache"),
        }
    }
}
