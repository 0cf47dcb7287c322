//! The cache contract and its moka-backed implementation.

use super::CacheEntry;
use crate::config::CacheConfig;
use async_trait::async_trait;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use twinguard_types::ErrorCode;

/// Error loading a cache entry.
///
/// # Error Codes
///
/// | Variant | Code | Recoverable |
/// |---------|------|-------------|
/// | [`CacheError::LoadFailed`] | `CACHE_LOAD_FAILED` | Yes |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The backing source could not answer.
    #[error("failed to load cache entry '{key}': {reason}")]
    LoadFailed {
        /// The key being loaded.
        key: String,
        /// What went wrong.
        reason: String,
    },
}

impl CacheError {
    /// Creates a load error.
    pub fn load_failed(key: impl ToString, reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for CacheError {
    fn code(&self) -> &'static str {
        match self {
            Self::LoadFailed { .. } => "CACHE_LOAD_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }
}

/// Async key → entry cache consulted during authorization.
///
/// `get` never reports a miss: it either returns a (possibly negative)
/// entry or fails. `invalidate` only affects subsequent lookups.
#[async_trait]
pub trait EntryCache<K, V>: Send + Sync
where
    K: Send + Sync,
{
    /// Returns the entry for `key`, loading it if necessary.
    async fn get(&self, key: &K) -> Result<CacheEntry<V>, CacheError>;

    /// Drops the entry for `key`.
    async fn invalidate(&self, key: &K);
}

/// Source of cache entries (the Policy/ACL persistence).
#[async_trait]
pub trait EntryLoader<K, V>: Send + Sync + 'static
where
    K: Send + Sync,
{
    /// Looks up `key`. Returns [`CacheEntry::nonexistent`] if nothing
    /// exists for it.
    async fn load(&self, key: &K) -> Result<CacheEntry<V>, CacheError>;
}

/// [`EntryCache`] on top of a `moka` future cache.
///
/// Concurrent lookups of the same key share one load. Negative entries are
/// cached like positive ones; failed loads are not cached.
pub struct LoadingCache<K, V, L> {
    cache: moka::future::Cache<K, CacheEntry<V>>,
    loader: Arc<L>,
}

impl<K, V, L> LoadingCache<K, V, L>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    L: EntryLoader<K, V>,
{
    /// Creates a cache loading from `loader` with the configured bounds.
    pub fn new(loader: Arc<L>, config: &CacheConfig) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.expire_after_write())
            .time_to_idle(config.expire_after_access())
            .build();
        Self { cache, loader }
    }
}

#[async_trait]
impl<K, V, L> EntryCache<K, V> for LoadingCache<K, V, L>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Display + 'static,
    V: Clone + Send + Sync + 'static,
    L: EntryLoader<K, V>,
{
    async fn get(&self, key: &K) -> Result<CacheEntry<V>, CacheError> {
        let loader = Arc::clone(&self.loader);
        let lookup = key.clone();
        self.cache
            .try_get_with(key.clone(), async move {
                let entry = loader.load(&lookup).await;
                debug!(key = %lookup, found = ?entry.as_ref().map(CacheEntry::exists).ok(), "Loaded cache entry");
                entry
            })
            .await
            .map_err(|e: Arc<CacheError>| (*e).clone())
    }

    async fn invalidate(&self, key: &K) {
        debug!(key = %key, "Invalidating cache entry");
        self.cache.invalidate(key).await;
    }
}
