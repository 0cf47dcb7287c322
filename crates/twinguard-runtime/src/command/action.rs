//! Thing command actions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use twinguard_auth::{Permissions, POLICY_ID_FIELD};
use twinguard_types::{JsonPointer, PolicyId, SubjectId};

/// Root segment of the attributes section of a Thing.
pub const ATTRIBUTES_FIELD: &str = "attributes";
/// Root segment of the features section of a Thing.
pub const FEATURES_FIELD: &str = "features";
/// Segment under a feature holding its properties.
pub const PROPERTIES_FIELD: &str = "properties";
/// Root segment of the legacy ACL of a Thing.
pub const ACL_FIELD: &str = "acl";
/// Field holding the id of a Thing.
pub const THING_ID_FIELD: &str = "thingId";

/// Broad classification of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandCategory {
    /// Reads without side effects.
    Query,
    /// Creates or changes (part of) a Thing.
    Modify,
    /// Removes (part of) a Thing.
    Delete,
}

impl CommandCategory {
    /// `Modify` and `Delete` both change state.
    #[must_use]
    pub fn is_modifying(self) -> bool {
        !matches!(self, Self::Query)
    }
}

/// What a [`ThingCommand`](super::ThingCommand) does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ThingAction {
    /// Creates a Thing, optionally with an inline Policy.
    CreateThing {
        thing: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_policy: Option<Value>,
    },
    /// Replaces a Thing; creates it if absent.
    ModifyThing {
        thing: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_policy: Option<Value>,
    },
    /// Deletes the whole Thing.
    DeleteThing,
    /// Reads the Thing, optionally only the selected fields.
    RetrieveThing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected_fields: Option<Vec<JsonPointer>>,
    },

    /// Replaces all attributes.
    ModifyAttributes {
        attributes: Value,
    },
    /// Deletes all attributes.
    DeleteAttributes,
    /// Reads all attributes.
    RetrieveAttributes,
    /// Sets the attribute at `pointer`.
    ModifyAttribute {
        pointer: JsonPointer,
        value: Value,
    },
    /// Deletes the attribute at `pointer`.
    DeleteAttribute {
        pointer: JsonPointer,
    },
    /// Reads the attribute at `pointer`.
    RetrieveAttribute {
        pointer: JsonPointer,
    },

    /// Replaces all features.
    ModifyFeatures {
        features: Value,
    },
    /// Deletes all features.
    DeleteFeatures,
    /// Reads all features.
    RetrieveFeatures,
    /// Sets one feature.
    ModifyFeature {
        feature_id: String,
        feature: Value,
    },
    /// Deletes one feature.
    DeleteFeature {
        feature_id: String,
    },
    /// Reads one feature.
    RetrieveFeature {
        feature_id: String,
    },
    /// Sets a feature property.
    ModifyFeatureProperty {
        feature_id: String,
        pointer: JsonPointer,
        value: Value,
    },
    /// Deletes a feature property.
    DeleteFeatureProperty {
        feature_id: String,
        pointer: JsonPointer,
    },
    /// Reads a feature property.
    RetrieveFeatureProperty {
        feature_id: String,
        pointer: JsonPointer,
    },

    /// Replaces the legacy ACL.
    ModifyAcl {
        acl: Value,
    },
    /// Sets the ACL entry of one subject.
    ModifyAclEntry {
        subject: SubjectId,
        permissions: Permissions,
    },
    /// Removes the ACL entry of one subject.
    DeleteAclEntry {
        subject: SubjectId,
    },
    /// Reads the legacy ACL.
    RetrieveAcl,
    /// Reads the ACL entry of one subject.
    RetrieveAclEntry {
        subject: SubjectId,
    },

    /// Points the Thing at another Policy.
    ModifyPolicyId {
        policy_id: PolicyId,
    },
    /// Reads the id of the governing Policy.
    RetrievePolicyId,
}

impl ThingAction {
    /// Returns the action name, e.g. `"modifyAttribute"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateThing { .. } => "createThing",
            Self::ModifyThing { .. } => "modifyThing",
            Self::DeleteThing => "deleteThing",
            Self::RetrieveThing { .. } => "retrieveThing",
            Self::ModifyAttributes { .. } => "modifyAttributes",
            Self::DeleteAttributes => "deleteAttributes",
            Self::RetrieveAttributes => "retrieveAttributes",
            Self::ModifyAttribute { .. } => "modifyAttribute",
            Self::DeleteAttribute { .. } => "deleteAttribute",
            Self::RetrieveAttribute { .. } => "retrieveAttribute",
            Self::ModifyFeatures { .. } => "modifyFeatures",
            Self::DeleteFeatures => "deleteFeatures",
            Self::RetrieveFeatures => "retrieveFeatures",
            Self::ModifyFeature { .. } => "modifyFeature",
            Self::DeleteFeature { .. } => "deleteFeature",
            Self::RetrieveFeature { .. } => "retrieveFeature",
            Self::ModifyFeatureProperty { .. } => "modifyFeatureProperty",
            Self::DeleteFeatureProperty { .. } => "deleteFeatureProperty",
            Self::RetrieveFeatureProperty { .. } => "retrieveFeatureProperty",
            Self::ModifyAcl { .. } => "modifyAcl",
            Self::ModifyAclEntry { .. } => "modifyAclEntry",
            Self::DeleteAclEntry { .. } => "deleteAclEntry",
            Self::RetrieveAcl => "retrieveAcl",
            Self::RetrieveAclEntry { .. } => "retrieveAclEntry",
            Self::ModifyPolicyId { .. } => "modifyPolicyId",
            Self::RetrievePolicyId => "retrievePolicyId",
        }
    }

    /// Returns the category of the action.
    #[must_use]
    pub fn category(&self) -> CommandCategory {
        match self {
            Self::RetrieveThing { .. }
            | Self::RetrieveAttributes
            | Self::RetrieveAttribute { .. }
            | Self::RetrieveFeatures
            | Self::RetrieveFeature { .. }
            | Self::RetrieveFeatureProperty { .. }
            | Self::RetrieveAcl
            | Self::RetrieveAclEntry { .. }
            | Self::RetrievePolicyId => CommandCategory::Query,
            Self::DeleteThing
            | Self::DeleteAttributes
            | Self::DeleteAttribute { .. }
            | Self::DeleteFeatures
            | Self::DeleteFeature { .. }
            | Self::DeleteFeatureProperty { .. }
            | Self::DeleteAclEntry { .. } => CommandCategory::Delete,
            _ => CommandCategory::Modify,
        }
    }

    /// Location inside the Thing the action addresses.
    #[must_use]
    pub fn resource_path(&self) -> JsonPointer {
        let root = JsonPointer::root();
        match self {
            Self::CreateThing { .. }
            | Self::ModifyThing { .. }
            | Self::DeleteThing
            | Self::RetrieveThing { .. } => root,
            Self::ModifyAttributes { .. } | Self::DeleteAttributes | Self::RetrieveAttributes => {
                root.child(ATTRIBUTES_FIELD)
            }
            Self::ModifyAttribute { pointer, .. }
            | Self::DeleteAttribute { pointer }
            | Self::RetrieveAttribute { pointer } => root.child(ATTRIBUTES_FIELD).join(pointer),
            Self::ModifyFeatures { .. } | Self::DeleteFeatures | Self::RetrieveFeatures => {
                root.child(FEATURES_FIELD)
            }
            Self::ModifyFeature { feature_id, .. }
            | Self::DeleteFeature { feature_id }
            | Self::RetrieveFeature { feature_id } => {
                root.child(FEATURES_FIELD).child(feature_id.as_str())
            }
            Self::ModifyFeatureProperty {
                feature_id,
                pointer,
                ..
            }
            | Self::DeleteFeatureProperty {
                feature_id,
                pointer,
            }
            | Self::RetrieveFeatureProperty {
                feature_id,
                pointer,
            } => root
                .child(FEATURES_FIELD)
                .child(feature_id.as_str())
                .child(PROPERTIES_FIELD)
                .join(pointer),
            Self::ModifyAcl { .. } | Self::RetrieveAcl => root.child(ACL_FIELD),
            Self::ModifyAclEntry { subject, .. }
            | Self::DeleteAclEntry { subject }
            | Self::RetrieveAclEntry { subject } => root.child(ACL_FIELD).child(subject.as_str()),
            Self::ModifyPolicyId { .. } | Self::RetrievePolicyId => root.child(POLICY_ID_FIELD),
        }
    }

    /// The whole-Thing JSON carried by create/replace actions.
    #[must_use]
    pub fn thing_payload(&self) -> Option<&Value> {
        match self {
            Self::CreateThing { thing, .. } | Self::ModifyThing { thing, .. } => Some(thing),
            _ => None,
        }
    }

    /// The inline policy carried by create/replace actions.
    #[must_use]
    pub fn initial_policy(&self) -> Option<&Value> {
        match self {
            Self::CreateThing { initial_policy, .. } | Self::ModifyThing { initial_policy, .. } => {
                initial_policy.as_ref()
            }
            _ => None,
        }
    }

    /// Whether applying the action may change which enforcer governs the Thing.
    #[must_use]
    pub fn changes_enforcer(&self) -> bool {
        matches!(
            self,
            Self::CreateThing { .. }
                | Self::ModifyThing { .. }
                | Self::DeleteThing
                | Self::ModifyAcl { .. }
                | Self::ModifyAclEntry { .. }
                | Self::DeleteAclEntry { .. }
                | Self::ModifyPolicyId { .. }
        )
    }
}
