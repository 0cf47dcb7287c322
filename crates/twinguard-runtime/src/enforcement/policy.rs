//! Policy evaluation.

use crate::command::ThingCommand;
use twinguard_auth::{AuthorizationDecision, Permissions, PolicyEnforcer, ResourceKey};

/// Evaluates `command` against a Policy enforcer.
///
/// A modify command needs `WRITE` on the whole addressed subtree. A query
/// only needs `READ` somewhere at or below the addressed path; the
/// response is filtered down to the readable part afterwards.
#[must_use]
pub fn evaluate(enforcer: &PolicyEnforcer, command: &ThingCommand) -> AuthorizationDecision {
    let resource = ResourceKey::thing(command.resource_path());
    let ctx = command.auth_context();

    let granted = if command.is_modifying() {
        enforcer.has_unrestricted_permissions(&resource, ctx, Permissions::WRITE)
    } else {
        enforcer.has_partial_permissions(&resource, ctx, Permissions::READ)
    };

    if granted {
        AuthorizationDecision::authorized(
            enforcer.subjects_with_permission(&resource, Permissions::READ),
        )
    } else if command.is_modifying() {
        AuthorizationDecision::denied(format!("no unrestricted WRITE on {resource}"))
    } else {
        AuthorizationDecision::denied(format!("no READ at or below {resource}"))
    }
}
