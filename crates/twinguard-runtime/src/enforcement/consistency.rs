//! Validation of creation commands before any permission evaluation.
//!
//! A created Thing is governed either by a Policy (inline or referenced
//! by id) or by a legacy ACL, never both. An inline Policy must carry the
//! id the Thing will refer to.

use crate::command::{ThingCommand, ACL_FIELD};
use crate::error::ThingError;
use serde_json::Value;
use twinguard_auth::{AccessControlList, Policy, POLICY_ID_FIELD};
use twinguard_types::{PolicyId, ThingId};

/// Where a creation command takes its permissions from, in order of
/// precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum CreationSource {
    /// The command carries an inline Policy.
    InlinePolicy(Policy),
    /// The Thing refers to an existing Policy.
    PolicyId(PolicyId),
    /// The Thing carries a legacy ACL.
    Acl(AccessControlList),
    /// No permission information; the creator is authorized.
    Unconditional,
}

/// Checks a creation command and determines its [`CreationSource`].
///
/// # Errors
///
/// In order of evaluation:
///
/// - [`ThingError::AclNotAllowed`] if the Thing carries an ACL and the
///   command also carries an inline Policy or the Thing a `policyId`.
/// - [`ThingError::PolicyIdNotAllowed`] if the inline Policy's `policyId`
///   differs from the Thing's `policyId` (or, if absent, from its id), or
///   if the Thing's `policyId` is malformed.
/// - [`ThingError::InlinePolicyInvalid`] if the inline Policy cannot be
///   parsed.
/// - [`ThingError::AclInvalid`] if the ACL cannot be parsed.
pub fn check(command: &ThingCommand) -> Result<CreationSource, ThingError> {
    let thing_id = &command.thing_id;
    let Some(thing) = command.action.thing_payload() else {
        return Ok(CreationSource::Unconditional);
    };
    let inline = command.action.initial_policy().filter(|p| !p.is_null());
    let acl = present(thing, ACL_FIELD);
    let declared = present(thing, POLICY_ID_FIELD);

    if acl.is_some() && (inline.is_some() || declared.is_some()) {
        return Err(ThingError::AclNotAllowed {
            thing_id: thing_id.clone(),
        });
    }

    if let Some(inline) = inline {
        if let Some(embedded) = present(inline, POLICY_ID_FIELD) {
            let expected = declared.map_or_else(|| thing_id.as_str().to_string(), raw);
            let embedded = raw(embedded);
            if embedded != expected {
                return Err(ThingError::PolicyIdNotAllowed {
                    thing_id: thing_id.clone(),
                    policy_id: embedded,
                });
            }
        }
        let policy = Policy::from_json(inline).map_err(|e| ThingError::InlinePolicyInvalid {
            thing_id: thing_id.clone(),
            reason: e.to_string(),
        })?;
        return Ok(CreationSource::InlinePolicy(policy));
    }

    if let Some(declared) = declared {
        let policy_id = declared
            .as_str()
            .and_then(|s| PolicyId::new(s).ok())
            .ok_or_else(|| ThingError::PolicyIdNotAllowed {
                thing_id: thing_id.clone(),
                policy_id: raw(declared),
            })?;
        return Ok(CreationSource::PolicyId(policy_id));
    }

    if let Some(acl) = acl {
        let acl = AccessControlList::from_json(acl).map_err(|e| ThingError::AclInvalid {
            thing_id: thing_id.clone(),
            reason: e.to_string(),
        })?;
        return Ok(CreationSource::Acl(acl));
    }

    Ok(CreationSource::Unconditional)
}

/// Id an inline Policy is stored under: its own `policyId`, else the
/// Thing's declared one, else the Thing id.
pub(crate) fn inline_policy_id(thing_id: &ThingId, thing: &Value, policy: &Policy) -> PolicyId {
    policy
        .policy_id
        .clone()
        .or_else(|| {
            present(thing, POLICY_ID_FIELD)
                .and_then(Value::as_str)
                .and_then(|raw| PolicyId::new(raw).ok())
        })
        .unwrap_or_else(|| PolicyId::from(thing_id.clone()))
}

fn present<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    value.get(field).filter(|v| !v.is_null())
}

/// Strings compare by content, anything else by its JSON text.
fn raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
