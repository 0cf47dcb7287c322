//! Explicit invalidation of both cache levels.

use super::{CacheKey, EnforcerCache, EnforcerIdCache};
use std::sync::Arc;
use tracing::debug;
use twinguard_types::ThingId;

/// Drops cached enforcer state after a change to a Thing or Policy.
#[derive(Clone)]
pub struct CacheInvalidator {
    id_cache: Arc<EnforcerIdCache>,
    enforcer_cache: Arc<EnforcerCache>,
}

impl CacheInvalidator {
    /// Creates an invalidator for the two caches.
    pub fn new(id_cache: Arc<EnforcerIdCache>, enforcer_cache: Arc<EnforcerCache>) -> Self {
        Self {
            id_cache,
            enforcer_cache,
        }
    }

    /// Forgets which enforcer governs `thing_id` and drops the Thing's ACL
    /// enforcer.
    pub async fn invalidate_thing(&self, thing_id: &ThingId) {
        let key = CacheKey::thing(thing_id);
        debug!(key = %key, "Invalidating thing");
        self.id_cache.invalidate(&key).await;
        self.enforcer_cache.invalidate(&key).await;
    }

    /// Drops one enforcer entry.
    pub async fn invalidate_enforcer(&self, key: &CacheKey) {
        self.enforcer_cache.invalidate(key).await;
    }
}
