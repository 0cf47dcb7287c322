//! twinguard runtime: authorization of Thing commands.
//!
//! Every command against a Thing passes [`ThingEnforcer`] before it reaches
//! the Thing's persistence worker, and every query response is filtered
//! down to what the requester may read.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  twinguard-types : ThingId, PolicyId, SubjectId, JsonPointer  │
//! │  twinguard-auth  : Permissions, ACL / Policy enforcers, views │
//! └───────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌───────────────────────────────────────────────────────────────┐
//! │                  Runtime Layer (THIS CRATE)                   │
//! ├───────────────────────────────────────────────────────────────┤
//! │  command/     : ThingCommand, ThingAction, ThingResponse      │
//! │  cache/       : CacheKey, CacheEntry, moka LoadingCache       │
//! │  enforcement/ : ThingEnforcer, evaluators, creation checks    │
//! │  dispatch/    : ask with timeout, ResponseOrchestrator        │
//! │  worker/      : PersistenceRouter, ThingShard, in-memory store│
//! │  config/      : TwinguardConfig, ConfigLoader                 │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! ## [`enforcement`] - Authorization
//!
//! - [`ThingEnforcer`]: resolves the governing enforcer once per command
//!   and dispatches to the ACL or Policy evaluator, or to
//!   self-authorization for Things that do not exist yet
//! - [`consistency`](enforcement::consistency): ACL / Policy exclusivity
//!   and inline Policy id checks for creation
//!
//! ## [`cache`] - Enforcer Cache
//!
//! Two levels: Thing → enforcer key, enforcer key → enforcer. Both cache
//! negative results.
//!
//! ## [`worker`] - Persistence Workers
//!
//! One task per Thing processes its commands in order.
//!
//! ## [`config`] - Configuration
//!
//! Configuration priority: Environment > Explicit file > Global > Default
//!
//! # Errors
//!
//! Requesters only ever see [`EnforcementError`]: a [`ThingError`], a
//! service timeout, or an opaque internal error whose cause is logged.

pub mod cache;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod enforcement;
pub mod error;
pub mod worker;

// Re-exports for convenience
pub use cache::{CacheEntry, CacheError, CacheInvalidator, CacheKey, LoadingCache};
pub use command::{ResponseStatus, ThingAction, ThingCommand, ThingResponse};
pub use config::{ConfigError, ConfigLoader, TwinguardConfig};
pub use dispatch::{AskOutcome, ResponseOrchestrator};
pub use enforcement::{Authorized, CreationSource, Resolution, ThingEnforcer};
pub use error::{EnforcementError, ThingError};
pub use worker::{InMemoryPersistence, PersistenceRouter, ThingShard};
