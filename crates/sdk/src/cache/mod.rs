use std::{str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use dimp_utils::{
    constants::{BALANCE_SNAPSHOT_PREFIX, SYNC_LOCK_PREFIX},
    Decimal, UserId,
};
use serde::{de::DeserializeOwned, Serialize};

/// In-memory cache.
pub mod memory;

/// Redis cache.
#[cfg(redis)]
pub mod redis;

pub use memory::MemoryCache;

#[cfg(redis)]
pub use self::redis::RedisCache;

/// A shared key-value cache with optional expiry.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Get the value of `key`.
    async fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Set `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> crate::Result<()>;

    /// Set `key` only if it is absent. Returns whether the value was written.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> crate::Result<bool>;

    /// Delete `key`.
    async fn delete(&self, key: &str) -> crate::Result<()>;
}

/// Cache key of the balance snapshot of `user`.
pub fn balance_key(user: UserId) -> String {
    format!("{BALANCE_SNAPSHOT_PREFIX}{user}")
}

/// Cache key of the sync lock of `user`.
pub fn sync_lock_key(user: UserId) -> String {
    format!("{SYNC_LOCK_PREFIX}{user}")
}

/// Read a JSON value. Malformed values are reported as absent.
pub async fn read_json<T: DeserializeOwned>(
    cache: &dyn KeyValueCache,
    key: &str,
) -> crate::Result<Option<T>> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            tracing::warn!(%err, key, "ignoring malformed cached value");
            Ok(None)
        }
    }
}

/// Write a JSON value.
pub async fn write_json<T: Serialize + ?Sized>(
    cache: &dyn KeyValueCache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> crate::Result<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw, ttl).await
}

/// Read the last balance of `user` confirmed on chain.
pub async fn read_snapshot(
    cache: &dyn KeyValueCache,
    user: UserId,
) -> crate::Result<Option<Decimal>> {
    let key = balance_key(user);
    let Some(raw) = cache.get(&key).await? else {
        return Ok(None);
    };
    match Decimal::from_str(raw.trim()) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            tracing::warn!(%err, key, "ignoring malformed balance snapshot");
            Ok(None)
        }
    }
}

/// Record the last balance of `user` confirmed on chain.
pub async fn write_snapshot(
    cache: &dyn KeyValueCache,
    user: UserId,
    balance: Decimal,
) -> crate::Result<()> {
    cache
        .set(&balance_key(user), &balance.normalize().to_string(), None)
        .await
}

/// Advisory per-user lock marking an on-chain balance write in flight.
///
/// While held, event ingestion leaves the user's ledger row untouched.
#[derive(Clone)]
pub struct SyncLock {
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
}

impl SyncLock {
    /// Create a lock family over `cache` whose entries expire after `ttl`.
    pub fn new(cache: Arc<dyn KeyValueCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Expiry of a lock entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the lock of `user` is currently held.
    pub async fn is_held(&self, user: UserId) -> crate::Result<bool> {
        Ok(self.cache.get(&sync_lock_key(user)).await?.is_some())
    }

    /// Try to take the lock of `user`. Returns `None` if it is already held.
    pub async fn try_acquire(&self, user: UserId) -> crate::Result<Option<SyncLockGuard>> {
        let key = sync_lock_key(user);
        if !self.cache.set_if_absent(&key, "1", Some(self.ttl)).await? {
            return Ok(None);
        }
        Ok(Some(SyncLockGuard {
            cache: self.cache.clone(),
            key,
            released: false,
        }))
    }
}

/// A held [`SyncLock`] entry.
///
/// Dropping the guard without [`release`](Self::release) schedules the
/// deletion on the current runtime; the TTL covers the rest.
pub struct SyncLockGuard {
    cache: Arc<dyn KeyValueCache>,
    key: String,
    released: bool,
}

impl SyncLockGuard {
    /// Release the lock.
    pub async fn release(mut self) -> crate::Result<()> {
        self.released = true;
        self.cache.delete(&self.key).await
    }
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(key = %self.key, "no runtime to release the sync lock");
            return;
        };
        let cache = self.cache.clone();
        let key = std::mem::take(&mut self.key);
        handle.spawn(async move {
            if let Err(err) = cache.delete(&key).await {
                tracing::warn!(%err, key, "failed to release the sync lock");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[tokio::test]
    async fn test_sync_lock_is_exclusive() -> eyre::Result<()> {
        let lock = SyncLock::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        let user = UserId(7);

        let guard = lock.try_acquire(user).await?.expect("acquired");
        assert!(lock.is_held(user).await?);
        assert!(lock.try_acquire(user).await?.is_none());
        assert!(!lock.is_held(UserId(8)).await?);

        guard.release().await?;
        assert!(!lock.is_held(user).await?);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_lock_expires() -> eyre::Result<()> {
        let lock = SyncLock::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        let user = UserId(1);
        let guard = lock.try_acquire(user).await?.expect("acquired");
        std::mem::forget(guard);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(lock.is_held(user).await?);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!lock.is_held(user).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_values_read_as_absent() -> eyre::Result<()> {
        let cache = MemoryCache::new();
        cache.set(&balance_key(UserId(1)), "not a number", None).await?;
        assert_eq!(read_snapshot(&cache, UserId(1)).await?, None);

        write_snapshot(&cache, UserId(1), dec!(1050.500000)).await?;
        assert_eq!(read_snapshot(&cache, UserId(1)).await?, Some(dec!(1050.5)));

        cache.set("json", "{", None).await?;
        assert_eq!(read_json::<Vec<u64>>(&cache, "json").await?, None);
        write_json(&cache, "json", &[1u64, 2], None).await?;
        assert_eq!(read_json::<Vec<u64>>(&cache, "json").await?, Some(vec![1, 2]));
        Ok(())
    }
}
