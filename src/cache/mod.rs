//! Ephemeral room cache: a best-effort key-value mirror of live room state.
//!
//! The cache is never the source of truth for correctness-critical decisions;
//! it only lets a restarted (or sibling) process restore a room without a full
//! durable rebuild. Cache failures degrade to in-process state and must never
//! block gameplay.

/// Room snapshot (de)serialization boundary.
pub mod codec;
/// In-process TTL fallback cache.
pub mod memory;
/// Redis-backed cache implementation.
pub mod redis;

use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Error raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache backend could not be reached or the operation failed.
    #[error("cache unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl CacheError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        CacheError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Key under which a room snapshot is cached.
pub fn room_key(game_id: Uuid) -> String {
    format!("room:{game_id}")
}

/// Pattern matching every cached room key.
pub const ROOM_KEY_PATTERN: &str = "room:*";

/// Abstraction over the ephemeral key-value cache holding live room state.
///
/// Values are JSON snapshots produced by [`codec`]; callers never reason about
/// the wire format themselves.
pub trait RoomCache: Send + Sync {
    /// Fetch a value by key.
    fn get(&self, key: String) -> BoxFuture<'static, CacheResult<Option<String>>>;
    /// Store a value with a TTL in seconds, refreshing any existing entry.
    fn set_with_ttl(
        &self,
        key: String,
        value: String,
        ttl_secs: u64,
    ) -> BoxFuture<'static, CacheResult<()>>;
    /// Remove a key; removing an absent key is not an error.
    fn delete(&self, key: String) -> BoxFuture<'static, CacheResult<()>>;
    /// List keys matching a glob-style pattern (trailing `*` wildcard).
    fn keys(&self, pattern: String) -> BoxFuture<'static, CacheResult<Vec<String>>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, CacheResult<()>>;
}
