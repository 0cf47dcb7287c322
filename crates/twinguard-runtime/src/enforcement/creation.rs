//! Self-authorization of commands creating a Thing that has no enforcer yet.

use super::consistency::{inline_policy_id, CreationSource};
use super::{acl, apply_decision, policy, Authorized};
use crate::cache::{CacheEntry, CacheKey, EnforcerCache, LookupContext};
use crate::command::ThingCommand;
use crate::error::{EnforcementError, ThingError};
use tracing::{debug, error};
use twinguard_auth::{AclEnforcer, AuthorizationDecision, Enforcer, PolicyEnforcer};
use twinguard_types::PolicyId;

/// Authorizes a creation command from the permission information it
/// carries itself.
///
/// An inline Policy or ACL yields a transient enforcer evaluated against
/// the command; an inline Policy must not replace an existing one. A
/// referenced Policy must already exist. Without any
/// permission information the command passes and only its first subject
/// may read the new Thing.
pub(crate) async fn authorize_creation(
    command: ThingCommand,
    source: CreationSource,
    enforcer_cache: &EnforcerCache,
    context: LookupContext,
) -> Result<Authorized, EnforcementError> {
    match source {
        CreationSource::InlinePolicy(inline) => {
            let policy_id = command
                .action
                .thing_payload()
                .map_or_else(
                    || PolicyId::from(command.thing_id.clone()),
                    |thing| inline_policy_id(&command.thing_id, thing, &inline),
                );
            let key = CacheKey::policy(&policy_id).with_context(context);
            if load_policy(enforcer_cache, &key, &command).await?.exists() {
                debug!(thing_id = %command.thing_id, policy_id = %policy_id, "Inline policy conflicts with an existing policy");
                return Err(ThingError::PolicyConflict {
                    thing_id: command.thing_id.clone(),
                    policy_id,
                }
                .into());
            }
            let enforcer = PolicyEnforcer::new(&inline);
            let decision = policy::evaluate(&enforcer, &command);
            Ok(apply_decision(command, decision, Some(enforcer.into()))?)
        }
        CreationSource::PolicyId(policy_id) => {
            let key = CacheKey::policy(&policy_id).with_context(context);
            match load_policy(enforcer_cache, &key, &command).await?.into_value() {
                Some(Enforcer::Policy(enforcer)) => {
                    let decision = policy::evaluate(&enforcer, &command);
                    Ok(apply_decision(command, decision, Some(enforcer.into()))?)
                }
                Some(other) => {
                    error!(
                        thing_id = %command.thing_id,
                        key = %key,
                        kind = %other.kind(),
                        "Policy key resolved to a non-policy enforcer"
                    );
                    Err(EnforcementError::Internal)
                }
                None => {
                    debug!(thing_id = %command.thing_id, policy_id = %policy_id, "Referenced policy does not exist");
                    Err(ThingError::ThingNotCreatable {
                        thing_id: command.thing_id.clone(),
                        missing_policy: Some(policy_id),
                    }
                    .into())
                }
            }
        }
        CreationSource::Acl(list) => {
            let enforcer = AclEnforcer::new(list);
            let decision = acl::evaluate(&enforcer, &command);
            Ok(apply_decision(command, decision, Some(enforcer.into()))?)
        }
        CreationSource::Unconditional => {
            let creator = command.auth_context().first().cloned();
            let decision = AuthorizationDecision::authorized(creator);
            Ok(apply_decision(command, decision, None)?)
        }
    }
}

async fn load_policy(
    enforcer_cache: &EnforcerCache,
    key: &CacheKey,
    command: &ThingCommand,
) -> Result<CacheEntry<Enforcer>, EnforcementError> {
    enforcer_cache.get(key).await.map_err(|e| {
        error!(
            thing_id = %command.thing_id,
            correlation_id = %command.headers.correlation_id,
            key = %key,
            error = %e,
            "Loading policy failed"
        );
        EnforcementError::Internal
    })
}
