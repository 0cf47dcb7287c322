//! Errors returned to the issuer of a Thing command.
//!
//! [`ThingError`] covers everything the domain reports: authorization
//! failures (deliberately indistinguishable from "not found"), consistency
//! failures on creation and conflicts reported by the persistence worker.
//! [`EnforcementError`] adds the failures of the round trip itself.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`ThingError::ThingNotAccessible`] | `THING_NOT_ACCESSIBLE` | No |
//! | [`ThingError::ThingNotModifiable`] | `THING_NOT_MODIFIABLE` | No |
//! | [`ThingError::ThingNotCreatable`] | `THING_NOT_CREATABLE` | No |
//! | [`ThingError::ThingNotDeletable`] | `THING_NOT_DELETABLE` | No |
//! | [`ThingError::ThingConflict`] | `THING_CONFLICT` | No |
//! | [`ThingError::PolicyConflict`] | `THING_POLICY_CONFLICT` | No |
//! | [`ThingError::AclNotAllowed`] | `THING_ACL_NOT_ALLOWED` | No |
//! | [`ThingError::AclInvalid`] | `THING_ACL_INVALID` | No |
//! | [`ThingError::PolicyIdNotAllowed`] | `THING_POLICY_ID_NOT_ALLOWED` | No |
//! | [`ThingError::InlinePolicyInvalid`] | `THING_INLINE_POLICY_INVALID` | No |
//! | [`ThingError::PayloadInvalid`] | `THING_PAYLOAD_INVALID` | No |
//! | [`EnforcementError::ServiceTimeout`] | `ENFORCEMENT_SERVICE_TIMEOUT` | Yes |
//! | [`EnforcementError::Internal`] | `ENFORCEMENT_INTERNAL` | No |
//!
//! The remaining `*NotAccessible` / `*NotModifiable` variants follow the
//! same `THING_<RESOURCE>_NOT_<ACCESSIBLE|MODIFIABLE>` scheme.
//!
//! # Example
//!
//! ```
//! use twinguard_runtime::ThingError;
//! use twinguard_types::{ErrorCode, ThingId};
//!
//! let err = ThingError::ThingNotModifiable {
//!     thing_id: ThingId::new("ns:lamp").unwrap(),
//!     missing_policy: None,
//! };
//! assert_eq!(err.code(), "THING_NOT_MODIFIABLE");
//! assert!(err.to_string().contains("insufficient permissions"));
//! ```

use thiserror::Error;
use twinguard_types::{ErrorCode, JsonPointer, PolicyId, SubjectId, ThingId};

fn not_found(what: &str, thing_id: &ThingId, verb: &str) -> String {
    format!(
        "The {what} of the Thing with ID '{thing_id}' could not be found or requester had \
         insufficient permissions to {verb} it."
    )
}

fn named_not_found(kind: &str, name: &dyn std::fmt::Display, thing_id: &ThingId, verb: &str) -> String {
    not_found(&format!("{kind} '{name}'"), thing_id, verb)
}

fn property_not_found(feature_id: &str, pointer: &JsonPointer, thing_id: &ThingId, verb: &str) -> String {
    not_found(
        &format!("Property '{pointer}' of Feature '{feature_id}'"),
        thing_id,
        verb,
    )
}

fn thing_not_found(thing_id: &ThingId, missing_policy: Option<&PolicyId>, verb: &str) -> String {
    match missing_policy {
        Some(policy_id) => format!(
            "The Thing with ID '{thing_id}' could not be {} as its Policy with ID '{policy_id}' \
             is not or no longer existing.",
            past_participle(verb)
        ),
        None => format!(
            "The Thing with ID '{thing_id}' could not be found or requester had insufficient \
             permissions to {verb} it."
        ),
    }
}

fn past_participle(verb: &str) -> &'static str {
    match verb {
        "modify" => "modified",
        "create" => "created",
        "delete" => "deleted",
        _ => "accessed",
    }
}

/// A domain error reported for a Thing command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThingError {
    /// The Thing does not exist or may not be read.
    #[error("{}", thing_not_found(.thing_id, .missing_policy.as_ref(), "access"))]
    ThingNotAccessible {
        /// Addressed Thing.
        thing_id: ThingId,
        /// Set when the Thing exists but its Policy does not.
        missing_policy: Option<PolicyId>,
    },

    /// The Thing does not exist or may not be changed.
    #[error("{}", thing_not_found(.thing_id, .missing_policy.as_ref(), "modify"))]
    ThingNotModifiable {
        /// Addressed Thing.
        thing_id: ThingId,
        /// Set when the Thing exists but its Policy does not.
        missing_policy: Option<PolicyId>,
    },

    /// The requester may not create the Thing.
    #[error("{}", thing_not_found(.thing_id, .missing_policy.as_ref(), "create"))]
    ThingNotCreatable {
        /// Addressed Thing.
        thing_id: ThingId,
        /// Set when the declared Policy does not exist.
        missing_policy: Option<PolicyId>,
    },

    /// The Thing does not exist or may not be deleted.
    #[error("{}", thing_not_found(.thing_id, None, "delete"))]
    ThingNotDeletable {
        /// Addressed Thing.
        thing_id: ThingId,
    },

    /// A Thing with this id already exists.
    #[error("The Thing with ID '{thing_id}' already exists.")]
    ThingConflict {
        /// Addressed Thing.
        thing_id: ThingId,
    },

    /// An inline Policy would replace an existing Policy.
    #[error(
        "The Policy with ID '{policy_id}' already exists and cannot be created inline for the \
         Thing with ID '{thing_id}'."
    )]
    PolicyConflict {
        /// Addressed Thing.
        thing_id: ThingId,
        /// Id of the existing Policy.
        policy_id: PolicyId,
    },

    #[error("{}", not_found("Attributes", .thing_id, "access"))]
    AttributesNotAccessible { thing_id: ThingId },

    #[error("{}", not_found("Attributes", .thing_id, "modify"))]
    AttributesNotModifiable { thing_id: ThingId },

    #[error("{}", named_not_found("Attribute", .pointer, .thing_id, "access"))]
    AttributeNotAccessible {
        thing_id: ThingId,
        pointer: JsonPointer,
    },

    #[error("{}", named_not_found("Attribute", .pointer, .thing_id, "modify"))]
    AttributeNotModifiable {
        thing_id: ThingId,
        pointer: JsonPointer,
    },

    #[error("{}", not_found("Features", .thing_id, "access"))]
    FeaturesNotAccessible { thing_id: ThingId },

    #[error("{}", not_found("Features", .thing_id, "modify"))]
    FeaturesNotModifiable { thing_id: ThingId },

    #[error("{}", named_not_found("Feature", .feature_id, .thing_id, "access"))]
    FeatureNotAccessible {
        thing_id: ThingId,
        feature_id: String,
    },

    #[error("{}", named_not_found("Feature", .feature_id, .thing_id, "modify"))]
    FeatureNotModifiable {
        thing_id: ThingId,
        feature_id: String,
    },

    #[error("{}", property_not_found(.feature_id, .pointer, .thing_id, "access"))]
    FeaturePropertyNotAccessible {
        thing_id: ThingId,
        feature_id: String,
        pointer: JsonPointer,
    },

    #[error("{}", property_not_found(.feature_id, .pointer, .thing_id, "modify"))]
    FeaturePropertyNotModifiable {
        thing_id: ThingId,
        feature_id: String,
        pointer: JsonPointer,
    },

    #[error("{}", not_found("ACL", .thing_id, "access"))]
    AclNotAccessible { thing_id: ThingId },

    #[error("{}", not_found("ACL", .thing_id, "modify"))]
    AclNotModifiable { thing_id: ThingId },

    #[error("{}", named_not_found("ACL entry for subject", .subject, .thing_id, "access"))]
    AclEntryNotAccessible {
        thing_id: ThingId,
        subject: SubjectId,
    },

    #[error("{}", named_not_found("ACL entry for subject", .subject, .thing_id, "modify"))]
    AclEntryNotModifiable {
        thing_id: ThingId,
        subject: SubjectId,
    },

    #[error("{}", not_found("Policy ID", .thing_id, "access"))]
    PolicyIdNotAccessible { thing_id: ThingId },

    #[error("{}", not_found("Policy ID", .thing_id, "modify"))]
    PolicyIdNotModifiable { thing_id: ThingId },

    /// The Thing carries an ACL while being created with a Policy.
    #[error(
        "The Thing with ID '{thing_id}' could not be created as it contains an ACL while \
         also using a Policy."
    )]
    AclNotAllowed {
        /// Addressed Thing.
        thing_id: ThingId,
    },

    /// The Thing's ACL could not be parsed.
    #[error("The ACL of the Thing with ID '{thing_id}' is invalid: {reason}")]
    AclInvalid {
        /// Addressed Thing.
        thing_id: ThingId,
        /// Parser message.
        reason: String,
    },

    /// The inline Policy's id does not match the Thing.
    #[error(
        "The Policy ID '{policy_id}' of the inline Policy is not allowed for the Thing with \
         ID '{thing_id}'."
    )]
    PolicyIdNotAllowed {
        /// Addressed Thing.
        thing_id: ThingId,
        /// The rejected policy id as given.
        policy_id: String,
    },

    /// The inline Policy could not be parsed.
    #[error("The inline Policy of the Thing with ID '{thing_id}' is invalid: {reason}")]
    InlinePolicyInvalid {
        /// Addressed Thing.
        thing_id: ThingId,
        /// Parser message.
        reason: String,
    },

    /// The command payload cannot be applied to the Thing.
    #[error("The payload for the Thing with ID '{thing_id}' is invalid: {reason}")]
    PayloadInvalid {
        /// Addressed Thing.
        thing_id: ThingId,
        /// What is wrong with it.
        reason: String,
    },
}

impl ThingError {
    /// Suggestion for the requester on how to resolve the error.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::ThingNotAccessible {
                missing_policy: Some(policy_id),
                ..
            }
            | Self::ThingNotModifiable {
                missing_policy: Some(policy_id),
                ..
            } => format!(
                "Recreate/create the Policy with ID '{policy_id}' in order to get access to the \
                 Thing again."
            ),
            Self::ThingNotCreatable {
                missing_policy: Some(policy_id),
                ..
            } => format!("Create the Policy with ID '{policy_id}' before creating the Thing."),
            Self::ThingConflict { .. } => {
                "Choose another Thing ID or modify the existing Thing.".to_string()
            }
            Self::PolicyConflict { policy_id, .. } => format!(
                "Refer to the Policy with ID '{policy_id}' without an inline Policy, or choose \
                 another Policy ID."
            ),
            Self::AclNotAllowed { .. } => {
                "Remove the ACL from the Thing or create it without a Policy.".to_string()
            }
            Self::PolicyIdNotAllowed { .. } => {
                "The Policy ID of the inline Policy must equal the Thing's Policy ID, or the \
                 Thing ID if the Thing declares none."
                    .to_string()
            }
            Self::AclInvalid { .. } | Self::InlinePolicyInvalid { .. } | Self::PayloadInvalid { .. } => {
                "Check the structure of the provided JSON.".to_string()
            }
            _ => "Check if the ID of your requested Thing was correct and you have sufficient \
                  permissions."
                .to_string(),
        }
    }
}

impl ErrorCode for ThingError {
    fn code(&self) -> &'static str {
        match self {
            Self::ThingNotAccessible { .. } => "THING_NOT_ACCESSIBLE",
            Self::ThingNotModifiable { .. } => "THING_NOT_MODIFIABLE",
            Self::ThingNotCreatable { .. } => "THING_NOT_CREATABLE",
            Self::ThingNotDeletable { .. } => "THING_NOT_DELETABLE",
            Self::ThingConflict { .. } => "THING_CONFLICT",
            Self::PolicyConflict { .. } => "THING_POLICY_CONFLICT",
            Self::AttributesNotAccessible { .. } => "THING_ATTRIBUTES_NOT_ACCESSIBLE",
            Self::AttributesNotModifiable { .. } => "THING_ATTRIBUTES_NOT_MODIFIABLE",
            Self::AttributeNotAccessible { .. } => "THING_ATTRIBUTE_NOT_ACCESSIBLE",
            Self::AttributeNotModifiable { .. } => "THING_ATTRIBUTE_NOT_MODIFIABLE",
            Self::FeaturesNotAccessible { .. } => "THING_FEATURES_NOT_ACCESSIBLE",
            Self::FeaturesNotModifiable { .. } => "THING_FEATURES_NOT_MODIFIABLE",
            Self::FeatureNotAccessible { .. } => "THING_FEATURE_NOT_ACCESSIBLE",
            Self::FeatureNotModifiable { .. } => "THING_FEATURE_NOT_MODIFIABLE",
            Self::FeaturePropertyNotAccessible { .. } => "THING_FEATURE_PROPERTY_NOT_ACCESSIBLE",
            Self::FeaturePropertyNotModifiable { .. } => "THING_FEATURE_PROPERTY_NOT_MODIFIABLE",
            Self::AclNotAccessible { .. } => "THING_ACL_NOT_ACCESSIBLE",
            Self::AclNotModifiable { .. } => "THING_ACL_NOT_MODIFIABLE",
            Self::AclEntryNotAccessible { .. } => "THING_ACL_ENTRY_NOT_ACCESSIBLE",
            Self::AclEntryNotModifiable { .. } => "THING_ACL_ENTRY_NOT_MODIFIABLE",
            Self::PolicyIdNotAccessible { .. } => "THING_POLICY_ID_NOT_ACCESSIBLE",
            Self::PolicyIdNotModifiable { .. } => "THING_POLICY_ID_NOT_MODIFIABLE",
            Self::AclNotAllowed { .. } => "THING_ACL_NOT_ALLOWED",
            Self::AclInvalid { .. } => "THING_ACL_INVALID",
            Self::PolicyIdNotAllowed { .. } => "THING_POLICY_ID_NOT_ALLOWED",
            Self::InlinePolicyInvalid { .. } => "THING_INLINE_POLICY_INVALID",
            Self::PayloadInvalid { .. } => "THING_PAYLOAD_INVALID",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Error answered to the issuer of a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnforcementError {
    /// A domain error, relayed as-is.
    #[error(transparent)]
    Thing(#[from] ThingError),

    /// The persistence worker did not answer in time.
    #[error("The service did not respond within {timeout_ms}ms.")]
    ServiceTimeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// Anything else. The cause is logged, never returned.
    #[error("An unexpected error occurred. Please try again later.")]
    Internal,
}

impl EnforcementError {
    /// Returns the wrapped domain error, if any.
    #[must_use]
    pub fn as_thing_error(&self) -> Option<&ThingError> {
        match self {
            Self::Thing(e) => Some(e),
            _ => None,
        }
    }
}

impl ErrorCode for EnforcementError {
    fn code(&self) -> &'static str {
        match self {
            Self::Thing(e) => e.code(),
            Self::ServiceTimeout { .. } => "ENFORCEMENT_SERVICE_TIMEOUT",
            Self::Internal => "ENFORCEMENT_INTERNAL",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Thing(e) => e.is_recoverable(),
            Self::ServiceTimeout { .. } => true,
            Self::Internal => false,
        }
    }
}
