//! Enforcer cache.
//!
//! # Two-level Resolution
//!
//! ```text
//! CacheKey(thing, id) ──► EnforcerIdCache ──► CacheEntry<CacheKey>   (which enforcer)
//!                                                   │
//!                                                   ▼
//!                          EnforcerCache  ──► CacheEntry<Enforcer>   (the enforcer)
//! ```
//!
//! An enforcer key of type `thing` denotes the Thing's own ACL; type
//! `policy` denotes the Policy the Thing refers to. Both levels cache
//! negative entries.

mod entry;
mod invalidator;
mod key;
mod loading;

pub use entry::CacheEntry;
pub use invalidator::CacheInvalidator;
pub use key::{CacheKey, CacheKeyError, LookupContext};
pub use loading::{CacheError, EntryCache, EntryLoader, LoadingCache};

use twinguard_auth::Enforcer;

/// Cache of Thing key → enforcer key.
pub type EnforcerIdCache = dyn EntryCache<CacheKey, CacheKey>;

/// Cache of enforcer key → enforcer.
pub type EnforcerCache = dyn EntryCache<CacheKey, Enforcer>;
