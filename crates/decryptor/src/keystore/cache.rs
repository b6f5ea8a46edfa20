//! [`KeyCache`]: bounded, TTL-expiring store for fetched private keys.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{KeyId, PrivateKeyPem};

struct CachedKey {
    pem: PrivateKeyPem,
    stored_at: Instant,
}

/// Process-local cache of private keys, keyed by key id.
///
/// Wraps an `Arc<Mutex<LruCache<_>>>` so that:
/// - At most `capacity` keys are held; the least recently used is evicted.
/// - An entry older than `ttl` is dropped on the lookup that finds it.
/// - Concurrent invocations in the same process serialise on one short lock.
///
/// Evicted and expired entries are zeroized when their last copy drops.
#[derive(Clone)]
pub struct KeyCache {
    inner: Arc<Mutex<LruCache<KeyId, CachedKey>>>,
    ttl: Duration,
}

impl KeyCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl,
        }
    }

    /// Build a cache from configuration; `None` when `ttl` or `capacity` is zero.
    pub fn from_settings(capacity: usize, ttl: Duration) -> Option<Self> {
        if ttl.is_zero() {
            return None;
        }
        NonZeroUsize::new(capacity).map(|capacity| Self::new(capacity, ttl))
    }

    /// A copy of the cached key, if present and not expired.
    pub async fn get(&self, key_id: &KeyId) -> Option<PrivateKeyPem> {
        let mut lock = self.inner.lock().await;
        let expired = match lock.get(key_id) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => return Some(entry.pem.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            lock.pop(key_id);
        }
        None
    }

    /// Store (or replace) the key for `key_id`.
    pub async fn insert(&self, key_id: &KeyId, pem: PrivateKeyPem) {
        let entry = CachedKey {
            pem,
            stored_at: Instant::now(),
        };
        self.inner.lock().await.put(key_id.clone(), entry);
    }

    /// Drop the entry for `key_id`. Returns whether one was present.
    pub async fn invalidate(&self, key_id: &KeyId) -> bool {
        self.inner.lock().await.pop(key_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}
