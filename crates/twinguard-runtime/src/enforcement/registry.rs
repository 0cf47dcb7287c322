//! Maps commands to the domain error reported when they are refused.
//!
//! | Command | Not found / not readable | Not authorized |
//! |---------|--------------------------|----------------|
//! | query | `*NotAccessible` | `*NotAccessible` |
//! | modify, sub-resource delete | `*NotAccessible` | `*NotModifiable` |
//! | `createThing` | `ThingNotAccessible` | `ThingNotCreatable` |
//! | `deleteThing` | `ThingNotAccessible` | `ThingNotDeletable` |
//!
//! The error names the granularity the command addresses (Thing,
//! attribute, feature property, ...).

use crate::command::{ThingAction, ThingCommand};
use crate::error::ThingError;
use twinguard_types::PolicyId;

/// Error for a command the requester is not allowed to perform.
pub(crate) fn not_authorized(command: &ThingCommand) -> ThingError {
    let thing_id = command.thing_id.clone();
    match &command.action {
        ThingAction::CreateThing { .. } => ThingError::ThingNotCreatable {
            thing_id,
            missing_policy: None,
        },
        ThingAction::DeleteThing => ThingError::ThingNotDeletable { thing_id },
        _ => for_resource(command, command.is_modifying()),
    }
}

/// Error for a command against something that does not exist.
pub(crate) fn not_found(command: &ThingCommand) -> ThingError {
    for_resource(command, false)
}

/// Error for a Thing whose Policy no longer exists.
pub(crate) fn policy_missing(command: &ThingCommand, policy_id: PolicyId) -> ThingError {
    let thing_id = command.thing_id.clone();
    let missing_policy = Some(policy_id);
    if command.is_modifying() {
        ThingError::ThingNotModifiable {
            thing_id,
            missing_policy,
        }
    } else {
        ThingError::ThingNotAccessible {
            thing_id,
            missing_policy,
        }
    }
}

fn for_resource(command: &ThingCommand, modifiable: bool) -> ThingError {
    use ThingAction as A;
    let thing_id = command.thing_id.clone();

    macro_rules! pick {
        ($accessible:ident, $modifiable:ident { $($field:ident: $value:expr),* }) => {
            if modifiable {
                ThingError::$modifiable { thing_id, $($field: $value),* }
            } else {
                ThingError::$accessible { thing_id, $($field: $value),* }
            }
        };
    }

    match &command.action {
        A::CreateThing { .. } | A::ModifyThing { .. } | A::DeleteThing | A::RetrieveThing { .. } => {
            pick!(ThingNotAccessible, ThingNotModifiable { missing_policy: None })
        }
        A::ModifyAttributes { .. } | A::DeleteAttributes | A::RetrieveAttributes => {
            pick!(AttributesNotAccessible, AttributesNotModifiable {})
        }
        A::ModifyAttribute { pointer, .. }
        | A::DeleteAttribute { pointer }
        | A::RetrieveAttribute { pointer } => {
            pick!(AttributeNotAccessible, AttributeNotModifiable { pointer: pointer.clone() })
        }
        A::ModifyFeatures { .. } | A::DeleteFeatures | A::RetrieveFeatures => {
            pick!(FeaturesNotAccessible, FeaturesNotModifiable {})
        }
        A::ModifyFeature { feature_id, .. }
        | A::DeleteFeature { feature_id }
        | A::RetrieveFeature { feature_id } => {
            pick!(FeatureNotAccessible, FeatureNotModifiable { feature_id: feature_id.clone() })
        }
        A::ModifyFeatureProperty {
            feature_id,
            pointer,
            ..
        }
        | A::DeleteFeatureProperty {
            feature_id,
            pointer,
        }
        | A::RetrieveFeatureProperty {
            feature_id,
            pointer,
        } => pick!(
            FeaturePropertyNotAccessible,
            FeaturePropertyNotModifiable {
                feature_id: feature_id.clone(),
                pointer: pointer.clone()
            }
        ),
        A::ModifyAcl { .. } | A::RetrieveAcl => pick!(AclNotAccessible, AclNotModifiable {}),
        A::ModifyAclEntry { subject, .. }
        | A::DeleteAclEntry { subject }
        | A::RetrieveAclEntry { subject } => {
            pick!(AclEntryNotAccessible, AclEntryNotModifiable { subject: subject.clone() })
        }
        A::ModifyPolicyId { .. } | A::RetrievePolicyId => {
            pick!(PolicyIdNotAccessible, PolicyIdNotModifiable {})
        }
    }
}
