//! Persistence workers.
//!
//! Every Thing is owned by at most one worker at a time. Commands for the
//! same Thing are processed in mailbox order; different Things run
//! concurrently.
//!
//! ```text
//! ThingEnforcer ──forward──► PersistenceRouter (ThingShard)
//!                                 │
//!                 ┌───────────────┼───────────────┐
//!                 ▼               ▼               ▼
//!           worker(ns:a)    worker(ns:b)    worker(ns:c)   one task + mailbox each
//!                 │
//!                 └─idle─► passivate ──► WorkerStopListener (cache invalidation)
//! ```

mod memory;
mod shard;

pub use memory::{InMemoryPersistence, InMemoryThing};
pub use shard::ThingShard;

use crate::cache::CacheInvalidator;
use crate::command::{ThingCommand, ThingResponse};
use crate::error::{EnforcementError, ThingError};
use async_trait::async_trait;
use tokio::sync::oneshot;
use twinguard_types::ThingId;

/// Where the answer to a command goes.
pub type ReplyTo = oneshot::Sender<Result<ThingResponse, EnforcementError>>;

/// Locates the worker of a Thing and hands it a command.
///
/// The worker answers `reply_to` itself. If the command cannot be
/// delivered, `reply_to` is dropped, which the waiting side observes as a
/// closed channel.
#[async_trait]
pub trait PersistenceRouter: Send + Sync + 'static {
    /// Delivers `command` to the worker owning its Thing.
    async fn forward(&self, command: ThingCommand, reply_to: ReplyTo);
}

/// Applies commands to the state of one Thing.
#[async_trait]
pub trait ThingBehavior: Send + 'static {
    /// Applies `command` and produces the response.
    ///
    /// # Errors
    ///
    /// Returns the domain error to relay to the requester.
    async fn handle(&mut self, command: ThingCommand) -> Result<ThingResponse, ThingError>;
}

/// Creates the behavior of a worker when it starts.
pub trait BehaviorFactory: Send + Sync + 'static {
    /// The behavior type.
    type Behavior: ThingBehavior;

    /// Creates the behavior for `thing_id`.
    fn create(&self, thing_id: &ThingId) -> Self::Behavior;
}

/// Notified when a worker stops.
pub trait WorkerStopListener: Send + Sync {
    /// Called once per stopped worker, from within the runtime.
    fn worker_stopped(&self, thing_id: &ThingId);
}

impl WorkerStopListener for CacheInvalidator {
    fn worker_stopped(&self, thing_id: &ThingId) {
        let invalidator = self.clone();
        let thing_id = thing_id.clone();
        tokio::spawn(async move {
            invalidator.invalidate_thing(&thing_id).await;
        });
    }
}
