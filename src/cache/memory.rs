//! In-process fallback implementation of [`RoomCache`].
//!
//! Used when no Redis URL is configured and while the Redis connection is
//! down. Entries expire lazily on access; an optional sweep removes the rest.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::cache::{CacheResult, RoomCache};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// TTL-aware in-process key-value cache.
#[derive(Default)]
pub struct InMemoryRoomCache {
    entries: DashMap<String, Entry>,
}

impl InMemoryRoomCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Called periodically by the cache supervisor.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }
}

impl RoomCache for InMemoryRoomCache {
    fn get(&self, key: String) -> BoxFuture<'static, CacheResult<Option<String>>> {
        let value = self.live_value(&key);
        Box::pin(async move { Ok(value) })
    }

    fn set_with_ttl(
        &self,
        key: String,
        value: String,
        ttl_secs: u64,
    ) -> BoxFuture<'static, CacheResult<()>> {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
        Box::pin(async { Ok(()) })
    }

    fn delete(&self, key: String) -> BoxFuture<'static, CacheResult<()>> {
        self.entries.remove(&key);
        Box::pin(async { Ok(()) })
    }

    fn keys(&self, pattern: String) -> BoxFuture<'static, CacheResult<Vec<String>>> {
        // Only the trailing-`*` glob used for room keys is supported.
        let prefix = pattern.strip_suffix('*').unwrap_or(&pattern).to_string();
        let now = Instant::now();
        let matching = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at > now && entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();
        Box::pin(async move { Ok(matching) })
    }

    fn health_check(&self) -> BoxFuture<'static, CacheResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let cache = InMemoryRoomCache::new();
        cache
            .set_with_ttl("room:a".into(), "{}".into(), 60)
            .await
            .unwrap();

        assert_eq!(cache.get("room:a".into()).await.unwrap(), Some("{}".into()));
        cache.delete("room:a".into()).await.unwrap();
        assert_eq!(cache.get("room:a".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = InMemoryRoomCache::new();
        cache
            .set_with_ttl("room:a".into(), "{}".into(), 0)
            .await
            .unwrap();

        assert_eq!(cache.get("room:a".into()).await.unwrap(), None);
        cache.purge_expired();
        assert!(cache.entries.is_empty());
    }

    #[tokio::test]
    async fn keys_matches_prefix_pattern() {
        let cache = InMemoryRoomCache::new();
        cache
            .set_with_ttl("room:a".into(), "{}".into(), 60)
            .await
            .unwrap();
        cache
            .set_with_ttl("room:b".into(), "{}".into(), 60)
            .await
            .unwrap();
        cache
            .set_with_ttl("other:c".into(), "{}".into(), 60)
            .await
            .unwrap();

        let mut keys = cache.keys("room:*".into()).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["room:a".to_string(), "room:b".to_string()]);
    }
}
