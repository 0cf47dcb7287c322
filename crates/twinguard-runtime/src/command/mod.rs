//! Thing commands and responses.
//!
//! A [`ThingCommand`] addresses one Thing, carries the requester's
//! [`AuthorizationContext`] in its [`CommandHeaders`] and describes the
//! operation as a [`ThingAction`]. Once authorized, the command is
//! extended with the read-subjects header before being forwarded.
//!
//! # Example
//!
//! ```
//! use twinguard_runtime::command::{CommandCategory, ThingAction, ThingCommand};
//! use twinguard_types::{AuthorizationContext, ThingId};
//!
//! let cmd = ThingCommand::new(
//!     ThingId::new("ns:lamp").unwrap(),
//!     AuthorizationContext::new(["nginx:alice"]),
//!     ThingAction::RetrieveFeatures,
//! );
//! assert_eq!(cmd.category(), CommandCategory::Query);
//! assert_eq!(cmd.resource_path().to_string(), "/features");
//! assert!(cmd.headers.read_subjects.is_none());
//! ```

mod action;

pub use action::{
    CommandCategory, ThingAction, ACL_FIELD, ATTRIBUTES_FIELD, FEATURES_FIELD, PROPERTIES_FIELD,
    THING_ID_FIELD,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use twinguard_types::{AuthorizationContext, JsonPointer, SubjectId, ThingId};
use uuid::Uuid;

/// Headers travelling with a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHeaders {
    /// Who is asking.
    pub auth_context: AuthorizationContext,
    /// Subjects allowed to read the addressed resource; set on authorization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_subjects: Option<BTreeSet<SubjectId>>,
    /// Correlates the command with its response and log lines.
    pub correlation_id: Uuid,
    /// Overrides the configured ask timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl CommandHeaders {
    /// Creates headers with a fresh correlation id.
    #[must_use]
    pub fn new(auth_context: AuthorizationContext) -> Self {
        Self {
            auth_context,
            read_subjects: None,
            correlation_id: Uuid::new_v4(),
            timeout: None,
        }
    }
}

/// A command against one Thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingCommand {
    /// Addressed Thing.
    pub thing_id: ThingId,
    /// Command headers.
    pub headers: CommandHeaders,
    /// The operation.
    pub action: ThingAction,
}

impl ThingCommand {
    /// Creates a command with fresh headers for `auth_context`.
    #[must_use]
    pub fn new(thing_id: ThingId, auth_context: AuthorizationContext, action: ThingAction) -> Self {
        Self {
            thing_id,
            headers: CommandHeaders::new(auth_context),
            action,
        }
    }

    /// Sets the per-command ask timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.headers.timeout = Some(timeout);
        self
    }

    /// Attaches the read-subjects header.
    #[must_use]
    pub fn with_read_subjects(mut self, subjects: BTreeSet<SubjectId>) -> Self {
        self.headers.read_subjects = Some(subjects);
        self
    }

    /// Returns the requester's authorization context.
    #[must_use]
    pub fn auth_context(&self) -> &AuthorizationContext {
        &self.headers.auth_context
    }

    /// Returns the command category.
    #[must_use]
    pub fn category(&self) -> CommandCategory {
        self.action.category()
    }

    /// Returns `true` for modify and delete commands.
    #[must_use]
    pub fn is_modifying(&self) -> bool {
        self.category().is_modifying()
    }

    /// Returns `true` for `CreateThing`.
    #[must_use]
    pub fn is_create(&self) -> bool {
        matches!(self.action, ThingAction::CreateThing { .. })
    }

    /// Location inside the Thing the command addresses.
    #[must_use]
    pub fn resource_path(&self) -> JsonPointer {
        self.action.resource_path()
    }

    /// Returns the action name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.action.name()
    }

    /// Turns a `ModifyThing` into a `CreateThing` with the same payload.
    ///
    /// Other commands are returned unchanged.
    #[must_use]
    pub fn into_create(self) -> Self {
        match self.action {
            ThingAction::ModifyThing {
                thing,
                initial_policy,
            } => Self {
                action: ThingAction::CreateThing {
                    thing,
                    initial_policy,
                },
                ..self
            },
            _ => self,
        }
    }

    /// Builds a response to this command.
    #[must_use]
    pub fn respond(&self, status: ResponseStatus, entity: Option<Value>) -> ThingResponse {
        ThingResponse {
            thing_id: self.thing_id.clone(),
            command: self.name().to_string(),
            resource_path: self.resource_path(),
            status,
            entity,
            correlation_id: self.headers.correlation_id,
        }
    }
}

/// Outcome class of a successful command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    /// A query result or an updated resource.
    Ok,
    /// The resource did not exist before.
    Created,
    /// Changed or deleted; no body.
    NoContent,
}

/// Response of a persistence worker to a [`ThingCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingResponse {
    /// Addressed Thing.
    pub thing_id: ThingId,
    /// Name of the answered command.
    pub command: String,
    /// Location of `entity` inside the Thing.
    pub resource_path: JsonPointer,
    /// Outcome class.
    pub status: ResponseStatus,
    /// Response body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Value>,
    /// Correlation id of the command.
    pub correlation_id: Uuid,
}

impl ThingResponse {
    /// Replaces the response body.
    #[must_use]
    pub fn with_entity(mut self, entity: Value) -> Self {
        self.entity = Some(entity);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thing_id() -> ThingId {
        ThingId::new("ns:t").expect("valid thing id")
    }

    #[test]
    fn upsert_conversion_keeps_payload_and_headers() {
        let cmd = ThingCommand::new(
            thing_id(),
            AuthorizationContext::new(["carol"]),
            ThingAction::ModifyThing {
                thing: json!({"attributes": {"a": 1}}),
                initial_policy: None,
            },
        );
        let correlation_id = cmd.headers.correlation_id;
        let created = cmd.into_create();
        assert!(created.is_create());
        assert_eq!(created.headers.correlation_id, correlation_id);
        assert_eq!(
            created.action.thing_payload(),
            Some(&json!({"attributes": {"a": 1}}))
        );
    }

    #[test]
    fn into_create_ignores_other_commands() {
        let cmd = ThingCommand::new(
            thing_id(),
            AuthorizationContext::new(["carol"]),
            ThingAction::DeleteThing,
        );
        assert_eq!(cmd.clone().into_create(), cmd);
    }

    #[test]
    fn correlation_ids_are_unique() {
        let a = CommandHeaders::new(AuthorizationContext::empty());
        let b = CommandHeaders::new(AuthorizationContext::empty());
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn response_mirrors_command() {
        let cmd = ThingCommand::new(
            thing_id(),
            AuthorizationContext::new(["carol"]),
            ThingAction::RetrieveFeature {
                feature_id: "temp".into(),
            },
        )
        .with_timeout(Duration::from_millis(50));
        let resp = cmd.respond(ResponseStatus::Ok, Some(json!({"properties": {}})));
        assert_eq!(resp.command, "retrieveFeature");
        assert_eq!(resp.resource_path.to_string(), "/features/temp");
        assert_eq!(resp.correlation_id, cmd.headers.correlation_id);
        assert_eq!(cmd.headers.timeout, Some(Duration::from_millis(50)));
    }
}
