pub mod keys;
pub mod memory;

use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use memory::MemoryCache;

const TTL_JITTER_RATIO: f64 = 0.1;

/// Key/value cache holding JSON payloads. Entries are replaced, never mutated.
pub trait CacheStore: Send + Sync {
    fn get_raw<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>>;

    fn set_raw<'a>(&'a self, key: &'a str, payload: String, ttl: Duration) -> BoxFuture<'a, ()>;

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ()>;

    /// Drops expired entries eagerly. Stores with native expiry return 0.
    fn purge_expired(&self) -> usize {
        0
    }
}

pub async fn get_json<T>(cache: &dyn CacheStore, key: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    let payload = cache.get_raw(key).await?;
    serde_json::from_str(&payload).ok()
}

pub async fn set_json<T>(cache: &dyn CacheStore, key: &str, value: &T, ttl: Duration)
where
    T: Serialize,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(_) => return,
    };
    cache.set_raw(key, payload, ttl).await;
}

#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_tokio_connection().await?;
        Ok(Self::new(connection))
    }
}

impl CacheStore for RedisCache {
    fn get_raw<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut conn = self.connection.clone();
            let payload: redis::RedisResult<Option<String>> = conn.get(key).await;
            payload.ok().flatten()
        })
    }

    fn set_raw<'a>(&'a self, key: &'a str, payload: String, ttl: Duration) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection.clone();
            if !ttl.is_zero() {
                let ttl = apply_ttl_jitter(ttl);
                let ttl_secs = ttl.as_secs().max(1);
                let _: Result<(), _> = conn.set_ex(key, payload, ttl_secs).await;
            } else {
                let _: Result<(), _> = conn.set(key, payload).await;
            }
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.connection.clone();
            let _: Result<u64, _> = conn.del(key).await;
        })
    }
}

fn apply_ttl_jitter(ttl: Duration) -> Duration {
    let base_ms = ttl.as_millis() as f64;
    let mut rng = rand::rng();
    let factor = rng.random_range(1.0 - TTL_JITTER_RATIO..=1.0 + TTL_JITTER_RATIO);
    let jittered_ms = (base_ms * factor).round().max(1.0);
    Duration::from_millis(jittered_ms as u64)
}
