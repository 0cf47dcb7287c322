//! ACL evaluation.
//!
//! ACL permissions are all-or-nothing per Thing. Writes that may change
//! who holds which permission additionally require `ADMINISTRATE`.

use crate::command::{ThingAction, ThingCommand, ACL_FIELD};
use twinguard_auth::{
    AclEnforcer, AuthorizationDecision, Permissions, ResourceKey, POLICY_ID_FIELD,
};

/// Permissions a command needs under an ACL.
///
/// | Command | Required |
/// |---------|----------|
/// | query | `READ` |
/// | `deleteThing`, anything under `/acl`, a Thing payload with `acl` or `policyId` | `WRITE \| ADMINISTRATE` |
/// | other modify | `WRITE` |
#[must_use]
pub fn required_permissions(command: &ThingCommand) -> Permissions {
    if !command.is_modifying() {
        return Permissions::READ;
    }
    if affects_acl(command) {
        Permissions::WRITE | Permissions::ADMINISTRATE
    } else {
        Permissions::WRITE
    }
}

fn affects_acl(command: &ThingCommand) -> bool {
    matches!(command.action, ThingAction::DeleteThing)
        || command.resource_path().root_segment() == Some(ACL_FIELD)
        || command
            .action
            .thing_payload()
            .is_some_and(|thing| {
                thing.get(ACL_FIELD).is_some() || thing.get(POLICY_ID_FIELD).is_some()
            })
}

/// Evaluates `command` against an ACL enforcer.
#[must_use]
pub fn evaluate(enforcer: &AclEnforcer, command: &ThingCommand) -> AuthorizationDecision {
    let resource = ResourceKey::thing(command.resource_path());
    let required = required_permissions(command);

    if enforcer.has_unrestricted_permissions(&resource, command.auth_context(), required) {
        AuthorizationDecision::authorized(
            enforcer.subjects_with_permission(&resource, Permissions::READ),
        )
    } else {
        AuthorizationDecision::denied(format!("ACL does not grant {required} on {resource}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twinguard_auth::AccessControlList;
    use twinguard_types::{AuthorizationContext, JsonPointer, SubjectId, ThingId};

    fn command(subject: &str, action: ThingAction) -> ThingCommand {
        ThingCommand::new(
            ThingId::new("ns:t").expect("valid thing id"),
            AuthorizationContext::new([subject]),
            action,
        )
    }

    fn enforcer() -> AclEnforcer {
        let acl = AccessControlList::from_json(&json!({
            "alice": {"READ": true, "WRITE": true, "ADMINISTRATE": false},
            "root": {"READ": true, "WRITE": true, "ADMINISTRATE": true},
            "guest": {"READ": true}
        }))
        .expect("valid acl");
        AclEnforcer::new(acl)
    }

    #[test]
    fn acl_changes_require_administrate() {
        let cases = [
            (ThingAction::DeleteThing, true),
            (
                ThingAction::DeleteAclEntry {
                    subject: "guest".into(),
                },
                true,
            ),
            (
                ThingAction::ModifyThing {
                    thing: json!({"acl": {}}),
                    initial_policy: None,
                },
                true,
            ),
            (
                ThingAction::ModifyThing {
                    thing: json!({"policyId": "ns:p"}),
                    initial_policy: None,
                },
                true,
            ),
            (
                ThingAction::ModifyThing {
                    thing: json!({"attributes": {}}),
                    initial_policy: None,
                },
                false,
            ),
            (
                ThingAction::ModifyAttribute {
                    pointer: JsonPointer::parse("/a"),
                    value: json!(1),
                },
                false,
            ),
        ];

        for (action, needs_admin) in cases {
            let required = required_permissions(&command("alice", action));
            assert_eq!(required.contains(Permissions::ADMINISTRATE), needs_admin);
            assert!(required.contains(Permissions::WRITE));
        }
        assert_eq!(
            required_permissions(&command("alice", ThingAction::RetrieveAcl)),
            Permissions::READ
        );
    }

    #[test]
    fn write_without_administrate_cannot_delete_thing() {
        let decision = evaluate(&enforcer(), &command("alice", ThingAction::DeleteThing));
        assert!(decision.is_denied());

        let decision = evaluate(&enforcer(), &command("root", ThingAction::DeleteThing));
        assert!(decision.is_authorized());
    }

    #[test]
    fn read_subjects_are_everyone_with_read() {
        let decision = evaluate(
            &enforcer(),
            &command(
                "alice",
                ThingAction::ModifyAttribute {
                    pointer: JsonPointer::parse("/a"),
                    value: json!(1),
                },
            ),
        );
        let subjects = decision.read_subjects().expect("authorized");
        let expected: Vec<SubjectId> = ["alice", "guest", "root"].map(SubjectId::new).into();
        assert_eq!(subjects.iter().cloned().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn reads_are_all_or_nothing() {
        let cmd = command(
            "stranger",
            ThingAction::RetrieveFeature {
                feature_id: "temp".into(),
            },
        );
        assert!(evaluate(&enforcer(), &cmd).is_denied());
    }
}
