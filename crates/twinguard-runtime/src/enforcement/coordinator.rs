//! The enforcement entry point.

use super::{acl, apply_decision, consistency, creation, policy, registry, Authorized};
use crate::cache::{
    CacheError, CacheInvalidator, CacheKey, EnforcerCache, EnforcerIdCache, EntryLoader,
    LoadingCache, LookupContext,
};
use crate::command::{ThingAction, ThingCommand, ThingResponse};
use crate::config::{EnforcementConfig, TwinguardConfig};
use crate::dispatch::ResponseOrchestrator;
use crate::error::EnforcementError;
use crate::worker::{PersistenceRouter, ReplyTo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};
use twinguard_auth::{AclEnforcer, Enforcer, PolicyEnforcer};
use twinguard_types::{PolicyId, ThingId};

/// Extra time [`ThingEnforcer::handle`] waits beyond the ask timeout, so
/// that a timeout answer produced downstream arrives first.
const HANDLE_GRACE: Duration = Duration::from_millis(250);

/// Which enforcer governs a Thing, as seen by one decision.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// No enforcer: the Thing does not exist (or no longer does).
    Absent,
    /// The Thing exists but the Policy it refers to does not.
    PolicyMissing(PolicyId),
    /// The Thing is governed by its own ACL.
    Acl(AclEnforcer),
    /// The Thing is governed by a Policy.
    Policy(PolicyEnforcer),
}

/// Authorizes Thing commands and forwards the permitted ones.
///
/// Holds no per-Thing state besides the caches, so any number of
/// decisions may run concurrently on clones of one enforcer.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use twinguard_runtime::command::{ThingAction, ThingCommand};
/// use twinguard_runtime::config::TwinguardConfig;
/// use twinguard_runtime::worker::{InMemoryPersistence, ThingShard};
/// use twinguard_runtime::ThingEnforcer;
/// use twinguard_types::{AuthorizationContext, ThingId};
///
/// # async fn example() -> Result<(), twinguard_runtime::EnforcementError> {
/// let config = TwinguardConfig::default();
/// let store = Arc::new(InMemoryPersistence::new());
/// let shard = Arc::new(ThingShard::new(Arc::clone(&store), config.worker.clone()));
/// let enforcer = ThingEnforcer::with_loaders(Arc::clone(&store), store, shard.clone(), &config);
/// shard.set_stop_listener(Arc::new(enforcer.invalidator()));
///
/// let response = enforcer
///     .handle(ThingCommand::new(
///         ThingId::new("ns:lamp").unwrap(),
///         AuthorizationContext::new(["nginx:carol"]),
///         ThingAction::RetrieveThing { selected_fields: None },
///     ))
///     .await?;
/// println!("{:?}", response.entity);
/// # Ok(())
/// # }
/// ```
pub struct ThingEnforcer<R: ?Sized> {
    id_cache: Arc<EnforcerIdCache>,
    enforcer_cache: Arc<EnforcerCache>,
    orchestrator: ResponseOrchestrator<R>,
}

impl<R: ?Sized> Clone for ThingEnforcer<R> {
    fn clone(&self) -> Self {
        Self {
            id_cache: Arc::clone(&self.id_cache),
            enforcer_cache: Arc::clone(&self.enforcer_cache),
            orchestrator: self.orchestrator.clone(),
        }
    }
}

impl<R> ThingEnforcer<R>
where
    R: PersistenceRouter + ?Sized,
{
    /// Creates an enforcer consulting the given caches.
    pub fn new(
        id_cache: Arc<EnforcerIdCache>,
        enforcer_cache: Arc<EnforcerCache>,
        router: Arc<R>,
        config: &EnforcementConfig,
    ) -> Self {
        let invalidator = CacheInvalidator::new(Arc::clone(&id_cache), Arc::clone(&enforcer_cache));
        Self {
            id_cache,
            enforcer_cache,
            orchestrator: ResponseOrchestrator::new(router, config, invalidator),
        }
    }

    /// Creates an enforcer with [`LoadingCache`]s in front of the given
    /// loaders.
    pub fn with_loaders<I, E>(
        id_loader: Arc<I>,
        enforcer_loader: Arc<E>,
        router: Arc<R>,
        config: &TwinguardConfig,
    ) -> Self
    where
        I: EntryLoader<CacheKey, CacheKey>,
        E: EntryLoader<CacheKey, Enforcer>,
    {
        let id_cache: Arc<EnforcerIdCache> = Arc::new(LoadingCache::new(id_loader, &config.cache));
        let enforcer_cache: Arc<EnforcerCache> =
            Arc::new(LoadingCache::new(enforcer_loader, &config.cache));
        Self::new(id_cache, enforcer_cache, router, &config.enforcement)
    }

    /// Returns an invalidator for this enforcer's caches.
    #[must_use]
    pub fn invalidator(&self) -> CacheInvalidator {
        CacheInvalidator::new(Arc::clone(&self.id_cache), Arc::clone(&self.enforcer_cache))
    }

    /// Authorizes `command` and, if permitted, forwards it. `reply_to` is
    /// answered exactly once: with the error if the command is refused,
    /// otherwise with whatever the persistence worker answers.
    pub async fn enforce(&self, command: ThingCommand, reply_to: ReplyTo) {
        match self.authorize(command).await {
            Ok(Authorized { command, enforcer }) => {
                self.orchestrator.dispatch(command, enforcer, reply_to).await;
            }
            Err(e) => {
                if reply_to.send(Err(e)).is_err() {
                    debug!("Requester no longer waiting for refusal");
                }
            }
        }
    }

    /// Enforces `command` and waits for the answer.
    ///
    /// # Errors
    ///
    /// Returns the refusal, the domain error of the worker,
    /// [`EnforcementError::ServiceTimeout`] if nothing arrives in time, or
    /// [`EnforcementError::Internal`].
    pub async fn handle(&self, command: ThingCommand) -> Result<ThingResponse, EnforcementError> {
        let ask_timeout = self.orchestrator.timeout_for(&command);
        let correlation_id = command.headers.correlation_id;
        let (tx, rx) = oneshot::channel();
        let exchange = async {
            self.enforce(command, tx).await;
            rx.await
        };

        match tokio::time::timeout(ask_timeout + HANDLE_GRACE, exchange).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                error!(%correlation_id, "Command was dropped without an answer");
                Err(EnforcementError::Internal)
            }
            Err(_) => {
                warn!(%correlation_id, "No answer within {ask_timeout:?}");
                Err(EnforcementError::ServiceTimeout {
                    timeout_ms: u64::try_from(ask_timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Decides whether `command` may be forwarded.
    ///
    /// # Errors
    ///
    /// Returns the error to answer the requester with.
    pub async fn authorize(&self, command: ThingCommand) -> Result<Authorized, EnforcementError> {
        let context = lookup_context(&command);
        match self.resolve(&command, context.clone()).await? {
            Resolution::Absent => {
                let command = command.into_create();
                if !command.is_create() {
                    debug!(
                        thing_id = %command.thing_id,
                        command = command.name(),
                        "No enforcer for thing"
                    );
                    return Err(registry::not_authorized(&command).into());
                }
                let source = consistency::check(&command)?;
                creation::authorize_creation(command, source, self.enforcer_cache.as_ref(), context)
                    .await
            }
            Resolution::PolicyMissing(policy_id) => {
                warn!(
                    thing_id = %command.thing_id,
                    policy_id = %policy_id,
                    "Thing refers to a policy that does not exist"
                );
                Err(registry::policy_missing(&command, policy_id).into())
            }
            Resolution::Acl(enforcer) => {
                let decision = acl::evaluate(&enforcer, &command);
                Ok(apply_decision(command, decision, Some(enforcer.into()))?)
            }
            Resolution::Policy(enforcer) => {
                let decision = policy::evaluate(&enforcer, &command);
                Ok(apply_decision(command, decision, Some(enforcer.into()))?)
            }
        }
    }

    /// Looks up the enforcer governing the command's Thing.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcementError::Internal`] if a cache lookup fails or
    /// its result is inconsistent.
    pub async fn resolve(
        &self,
        command: &ThingCommand,
        context: LookupContext,
    ) -> Result<Resolution, EnforcementError> {
        let key = CacheKey::thing(&command.thing_id).with_context(context.clone());
        let id_entry = self
            .id_cache
            .get(&key)
            .await
            .map_err(|e| cache_failure(command, &e))?;
        let Some(enforcer_key) = id_entry.into_value() else {
            return Ok(Resolution::Absent);
        };

        let entry = self
            .enforcer_cache
            .get(&enforcer_key.clone().with_context(context))
            .await
            .map_err(|e| cache_failure(command, &e))?;

        let resolution = match (enforcer_key.is_thing(), entry.into_value()) {
            (true, None) => Resolution::Absent,
            (true, Some(Enforcer::Acl(e))) => Resolution::Acl(e),
            (false, Some(Enforcer::Policy(e))) => Resolution::Policy(e),
            (false, None) => match enforcer_key.policy_id() {
                Ok(policy_id) => Resolution::PolicyMissing(policy_id),
                Err(e) => {
                    error!(thing_id = %command.thing_id, key = %enforcer_key, error = %e, "Invalid enforcer key");
                    return Err(EnforcementError::Internal);
                }
            },
            (_, Some(other)) => {
                error!(
                    thing_id = %command.thing_id,
                    key = %enforcer_key,
                    kind = %other.kind(),
                    "Enforcer kind does not match its key"
                );
                return Err(EnforcementError::Internal);
            }
        };
        debug!(thing_id = %command.thing_id, key = %enforcer_key, "Resolved enforcer");
        Ok(resolution)
    }

    /// Drops cached enforcer state of a Thing.
    pub async fn invalidate_thing(&self, thing_id: &ThingId) {
        self.invalidator().invalidate_thing(thing_id).await;
    }

    /// Drops one cached enforcer, e.g. after a Policy changed.
    pub async fn invalidate_enforcer(&self, key: &CacheKey) {
        self.invalidator().invalidate_enforcer(key).await;
    }
}

fn lookup_context(command: &ThingCommand) -> LookupContext {
    let selected_fields = match &command.action {
        ThingAction::RetrieveThing { selected_fields } => selected_fields.clone(),
        _ => None,
    };
    LookupContext {
        correlation_id: Some(command.headers.correlation_id),
        selected_fields,
    }
}

fn cache_failure(command: &ThingCommand, e: &CacheError) -> EnforcementError {
    error!(
        thing_id = %command.thing_id,
        correlation_id = %command.headers.correlation_id,
        error = %e,
        "Enforcer lookup failed"
    );
    EnforcementError::Internal
}
