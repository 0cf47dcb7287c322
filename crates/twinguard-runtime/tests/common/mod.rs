//! Shared wiring for integration tests: in-memory persistence behind a
//! worker shard, fronted by a `ThingEnforcer`.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use twinguard_auth::Policy;
use twinguard_runtime::command::{ThingAction, ThingCommand};
use twinguard_runtime::config::TwinguardConfig;
use twinguard_runtime::worker::{InMemoryPersistence, PersistenceRouter, ReplyTo, ThingShard};
use twinguard_runtime::ThingEnforcer;
use twinguard_types::{AuthorizationContext, PolicyId, ThingId};

pub type Shard = ThingShard<InMemoryPersistence>;

pub struct Stack {
    pub store: Arc<InMemoryPersistence>,
    pub shard: Arc<Shard>,
    pub enforcer: ThingEnforcer<Shard>,
}

impl Stack {
    pub fn new() -> Self {
        Self::with_config(TwinguardConfig::default())
    }

    pub fn with_config(config: TwinguardConfig) -> Self {
        let store = Arc::new(InMemoryPersistence::new());
        let shard = Arc::new(ThingShard::new(Arc::clone(&store), config.worker.clone()));
        let enforcer = ThingEnforcer::with_loaders(
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&shard),
            &config,
        );
        shard.set_stop_listener(Arc::new(enforcer.invalidator()));
        Self {
            store,
            shard,
            enforcer,
        }
    }

    pub fn put_thing(&self, id: &str, thing: Value) {
        self.store.put_thing(thing_id(id), thing);
    }

    pub fn put_policy(&self, id: &str, policy: Value) {
        let policy = Policy::from_json(&policy).expect("valid policy");
        self.store.put_policy(policy_id(id), policy);
    }
}

/// Router that accepts every command and never answers.
#[derive(Default)]
pub struct BlackHole {
    pending: Mutex<Vec<ReplyTo>>,
}

#[async_trait]
impl PersistenceRouter for BlackHole {
    async fn forward(&self, _command: ThingCommand, reply_to: ReplyTo) {
        self.pending.lock().push(reply_to);
    }
}

/// Router whose delivery never completes, like a worker with a full mailbox.
pub struct Stalled;

#[async_trait]
impl PersistenceRouter for Stalled {
    async fn forward(&self, _command: ThingCommand, _reply_to: ReplyTo) {
        std::future::pending::<()>().await;
    }
}

pub fn thing_id(id: &str) -> ThingId {
    ThingId::new(id).expect("valid thing id")
}

pub fn policy_id(id: &str) -> PolicyId {
    PolicyId::new(id).expect("valid policy id")
}

pub fn command(thing: &str, subjects: &[&str], action: ThingAction) -> ThingCommand {
    ThingCommand::new(
        thing_id(thing),
        AuthorizationContext::new(subjects.iter().copied()),
        action,
    )
}

pub fn retrieve_thing() -> ThingAction {
    ThingAction::RetrieveThing {
        selected_fields: None,
    }
}
