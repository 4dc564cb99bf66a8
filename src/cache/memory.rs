use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use moka::Expiry;

use super::CacheStore;

#[derive(Clone)]
struct Entry {
    payload: String,
    ttl: Option<Duration>,
}

/// Expires each entry after the TTL it was written with; a zero TTL never expires.
struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Bounded in-process cache with per-entry TTL.
pub struct MemoryCache {
    cache: Cache<String, Entry>,
    expired: Arc<AtomicUsize>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let expired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&expired);
        let cache = Cache::builder()
            .max_capacity(capacity.max(1) as u64)
            .expire_after(EntryTtl)
            .eviction_listener(move |_key, _value, cause| {
                if cause == RemovalCause::Expired {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build();
        Self { cache, expired }
    }

    pub fn len(&self) -> usize {
        self.cache.run_pending_tasks();
        self.cache.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get_raw<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        let value = self.cache.get(key).map(|entry| entry.payload);
        Box::pin(async move { value })
    }

    fn set_raw<'a>(&'a self, key: &'a str, payload: String, ttl: Duration) -> BoxFuture<'a, ()> {
        let ttl = if ttl.is_zero() { None } else { Some(ttl) };
        self.cache.insert(key.to_string(), Entry { payload, ttl });
        Box::pin(async {})
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ()> {
        self.cache.invalidate(key);
        Box::pin(async {})
    }

    /// Runs pending housekeeping and reports entries expired since the last purge.
    fn purge_expired(&self) -> usize {
        self.cache.run_pending_tasks();
        self.expired.swap(0, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stays_within_capacity() {
        let cache = MemoryCache::new(2);
        for key in ["a", "b", "c", "d", "e"] {
            cache.set_raw(key, key.to_string(), Duration::ZERO).await;
        }
        assert!(cache.len() <= 2);
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = MemoryCache::new(8);
        cache.set_raw("k", "v".into(), Duration::from_millis(5)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get_raw("k").await.is_none());
    }

    #[tokio::test]
    async fn purge_reports_removed_count() {
        let cache = MemoryCache::new(8);
        cache.set_raw("short", "v".into(), Duration::from_millis(1)).await;
        cache.set_raw("long", "v".into(), Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test]
    async fn set_replaces_existing_value() {
        let cache = MemoryCache::new(8);
        cache.set_raw("k", "old".into(), Duration::ZERO).await;
        cache.set_raw("k", "new".into(), Duration::ZERO).await;
        assert_eq!(cache.get_raw("k").await.as_deref(), Some("new"));
        cache.delete("k").await;
        assert!(cache.get_raw("k").await.is_none());
    }

    #[tokio::test]
    async fn update_takes_the_new_ttl() {
        let cache = MemoryCache::new(8);
        cache.set_raw("k", "short".into(), Duration::from_millis(5)).await;
        cache.set_raw("k", "long".into(), Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get_raw("k").await.as_deref(), Some("long"));
    }
}
