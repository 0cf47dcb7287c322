//! Forwards authorized commands and shapes what the requester gets back.

use super::ask::{ask, AskOutcome};
use crate::cache::{CacheInvalidator, CacheKey};
use crate::command::{ThingAction, ThingCommand, ThingResponse};
use crate::config::EnforcementConfig;
use crate::error::EnforcementError;
use crate::worker::{PersistenceRouter, ReplyTo};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use twinguard_auth::{Enforcer, Permissions, ResourceKey, POLICY_ID_FIELD};
use twinguard_types::{AuthorizationContext, PolicyId, ThingId};

/// Sends authorized commands to persistence and answers the requester.
pub struct ResponseOrchestrator<R: ?Sized> {
    router: Arc<R>,
    ask_timeout: Duration,
    always_visible: Arc<[String]>,
    invalidator: CacheInvalidator,
}

impl<R: ?Sized> Clone for ResponseOrchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            ask_timeout: self.ask_timeout,
            always_visible: Arc::clone(&self.always_visible),
            invalidator: self.invalidator.clone(),
        }
    }
}

impl<R> ResponseOrchestrator<R>
where
    R: PersistenceRouter + ?Sized,
{
    /// Creates an orchestrator forwarding to `router`.
    pub fn new(router: Arc<R>, config: &EnforcementConfig, invalidator: CacheInvalidator) -> Self {
        Self {
            router,
            ask_timeout: config.ask_timeout(),
            always_visible: config.always_visible_fields.clone().into(),
            invalidator,
        }
    }

    /// The ask timeout for `command`: its own header, else the configured one.
    #[must_use]
    pub fn timeout_for(&self, command: &ThingCommand) -> Duration {
        command.headers.timeout.unwrap_or(self.ask_timeout)
    }

    /// Dispatches an authorized command. `reply_to` is answered exactly
    /// once, possibly after this method returns.
    ///
    /// `enforcer` is required for queries; their responses are filtered
    /// with it.
    pub async fn dispatch(&self, command: ThingCommand, enforcer: Option<Enforcer>, reply_to: ReplyTo) {
        if command.is_modifying() {
            if command.action.changes_enforcer() {
                self.relay(command, reply_to).await;
            } else {
                self.router.forward(command, reply_to).await;
            }
            return;
        }

        let Some(enforcer) = enforcer else {
            error!(
                thing_id = %command.thing_id,
                correlation_id = %command.headers.correlation_id,
                command = command.name(),
                "Authorized query without enforcer"
            );
            let _ = reply_to.send(Err(EnforcementError::Internal));
            return;
        };

        let router = Arc::clone(&self.router);
        let timeout = self.timeout_for(&command);
        let always_visible = Arc::clone(&self.always_visible);
        let ctx = command.auth_context().clone();
        let correlation_id = command.headers.correlation_id;
        let resource = ResourceKey::thing(command.resource_path());
        let name = command.name();

        tokio::spawn(async move {
            let result = match ask(router.as_ref(), command, timeout).await {
                AskOutcome::Response(response) => {
                    let visible: &[String] = if resource.path().is_root() {
                        &always_visible
                    } else {
                        &[]
                    };
                    Ok(filter_response(response, &enforcer, &resource, &ctx, visible))
                }
                AskOutcome::DomainError(e) => Err(EnforcementError::Thing(e)),
                AskOutcome::Timeout(elapsed) => {
                    warn!(%correlation_id, command = name, "Query timed out after {elapsed:?}");
                    Err(service_timeout(elapsed))
                }
                AskOutcome::Unexpected(reason) => {
                    error!(%correlation_id, command = name, %reason, "Query failed");
                    Err(EnforcementError::Internal)
                }
            };
            if reply_to.send(result).is_err() {
                debug!(%correlation_id, "Requester no longer waiting");
            }
        });
    }

    /// Forwards a command that may change the governing enforcer and
    /// invalidates the caches before answering. The timeout covers
    /// delivery to the worker as well.
    async fn relay(&self, command: ThingCommand, reply_to: ReplyTo) {
        let router = Arc::clone(&self.router);
        let timeout = self.timeout_for(&command);
        let thing_id = command.thing_id.clone();
        let correlation_id = command.headers.correlation_id;
        let name = command.name();
        let mut policies = referenced_policies(&command);
        let invalidator = self.invalidator.clone();

        tokio::spawn(async move {
            let result = match ask(router.as_ref(), command, timeout).await {
                AskOutcome::Response(response) => {
                    policies.extend(response_policy(&response));
                    invalidate(&invalidator, &thing_id, &policies).await;
                    Ok(response)
                }
                AskOutcome::DomainError(e) => Err(EnforcementError::Thing(e)),
                AskOutcome::Timeout(elapsed) => {
                    warn!(%correlation_id, command = name, "Modify timed out after {elapsed:?}");
                    Err(service_timeout(elapsed))
                }
                AskOutcome::Unexpected(reason) => {
                    error!(%correlation_id, command = name, %reason, "Modify failed");
                    Err(EnforcementError::Internal)
                }
            };
            if reply_to.send(result).is_err() {
                debug!(%correlation_id, "Requester no longer waiting");
            }
        });
    }
}

fn filter_response(
    response: ThingResponse,
    enforcer: &Enforcer,
    resource: &ResourceKey,
    ctx: &AuthorizationContext,
    always_visible: &[String],
) -> ThingResponse {
    match &response.entity {
        Some(entity) => {
            let view =
                enforcer.build_filtered_view(resource, entity, ctx, always_visible, Permissions::READ);
            response.with_entity(view)
        }
        None => response,
    }
}

fn service_timeout(elapsed: Duration) -> EnforcementError {
    EnforcementError::ServiceTimeout {
        timeout_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    }
}

async fn invalidate(invalidator: &CacheInvalidator, thing_id: &ThingId, policies: &[PolicyId]) {
    invalidator.invalidate_thing(thing_id).await;
    for policy_id in policies {
        invalidator
            .invalidate_enforcer(&CacheKey::policy(policy_id))
            .await;
    }
}

/// Policies a command may make a Thing refer to.
fn referenced_policies(command: &ThingCommand) -> Vec<PolicyId> {
    match &command.action {
        ThingAction::ModifyPolicyId { policy_id } => vec![policy_id.clone()],
        ThingAction::CreateThing {
            thing,
            initial_policy,
        }
        | ThingAction::ModifyThing {
            thing,
            initial_policy,
        } => {
            let mut ids: Vec<PolicyId> = [Some(thing), initial_policy.as_ref()]
                .into_iter()
                .flatten()
                .filter_map(policy_id_of)
                .collect();
            ids.push(PolicyId::from(command.thing_id.clone()));
            ids
        }
        _ => Vec::new(),
    }
}

fn response_policy(response: &ThingResponse) -> Option<PolicyId> {
    response.entity.as_ref().and_then(policy_id_of)
}

fn policy_id_of(value: &Value) -> Option<PolicyId> {
    value
        .get(POLICY_ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| PolicyId::new(raw).ok())
}
