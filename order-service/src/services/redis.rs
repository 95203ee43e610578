//! Distributed locks over Redis.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, RedisError, Script};
use secrecy::{ExposeSecret, Secret};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Deletes the key only while it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `token` if absent, expiring after `ttl`. Returns whether
    /// the lock was taken.
    async fn acquire(&self, key: &str, token: &str, ttl: Duration)
        -> Result<bool, anyhow::Error>;
    /// Remove `key` if it still holds `token`.
    async fn release(&self, key: &str, token: &str) -> Result<(), anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(url: &Secret<String>) -> Result<Self, RedisError> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(url.expose_secret().as_str())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            e
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl LockStore for RedisService {
    async fn acquire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to acquire lock {}: {}", key, e))?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str, token: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let _deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to release lock {}: {}", key, e))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// Process-local lock store with the same expiry semantics as Redis.
#[derive(Default)]
pub struct InMemoryLockStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .get(key)
                    .is_some_and(|(_, expires_at)| *expires_at > Instant::now())
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn acquire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, anyhow::Error> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock store mutex poisoned: {}", e))?;

        let now = Instant::now();
        if let Some((_, expires_at)) = entries.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }

        entries.insert(key.to_string(), (token.to_string(), now + ttl));
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> Result<(), anyhow::Error> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock store mutex poisoned: {}", e))?;

        if entries.get(key).is_some_and(|(held, _)| held == token) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

/// A held lock. Call [`LockGuard::release`] on the normal path; a guard
/// dropped while still held releases from a background task.
pub struct LockGuard {
    store: Arc<dyn LockStore>,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    /// Try to take `key`. `Ok(None)` means someone else holds it.
    pub async fn acquire(
        store: Arc<dyn LockStore>,
        key: impl Into<String>,
        ttl: Duration,
    ) -> Result<Option<Self>, anyhow::Error> {
        let key = key.into();
        let token = Uuid::new_v4().to_string();

        if !store.acquire(&key, &token, ttl).await? {
            return Ok(None);
        }

        Ok(Some(Self {
            store,
            key,
            token,
            released: false,
        }))
    }

    pub async fn release(mut self) -> Result<(), anyhow::Error> {
        self.released = true;
        self.store.release(&self.key, &self.token).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.release(&key, &token).await {
                        tracing::warn!(lock = %key, error = %e, "Failed to release dropped lock");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(lock = %key, "Lock dropped outside a runtime; it will expire by TTL");
            }
        }
    }
}
