//! # Concierge State
//!
//! Two-tier session and conversation state for the Concierge engine.
//!
//! The durable tier (SQLite) is the system of record; the cache tier
//! (in-process map, or Redis with the `redis` feature) is a disposable
//! accelerator with short TTLs. The [`StateManager`] coordinates the two:
//! dual writes durable-first, read-through on misses, and
//! never-resurrecting session invalidation.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use concierge_state::{InMemoryCache, SqliteStore, StateConfig, StateManager};
//!
//! # async fn demo() -> Result<(), concierge_core::StateError> {
//! let durable = Arc::new(SqliteStore::open("concierge.db")?);
//! let cache = Arc::new(InMemoryCache::new());
//! let state = StateManager::new(durable, cache, StateConfig::default());
//!
//! let user = concierge_core::UserId::parse("user-1").unwrap();
//! let session = state.create_session(user).await?;
//! assert!(state.require_active_session(&session.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod durable;
pub mod in_memory;
pub mod manager;
pub mod sqlite;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use cache::{CacheTier, session_key, turns_key};
pub use durable::DurableStore;
pub use in_memory::InMemoryCache;
pub use manager::{StateConfig, StateManager};
pub use sqlite::SqliteStore;

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;
