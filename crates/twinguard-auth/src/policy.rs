//! Policy documents.
//!
//! A [`Policy`] is a set of labelled entries. Each entry names the subjects
//! it applies to and, per [`ResourceKey`], the permissions it grants and
//! revokes for them.
//!
//! # JSON Format
//!
//! ```text
//! {
//!   "policyId": "org.acme:boiler",
//!   "entries": {
//!     "owner": {
//!       "subjects":  { "nginx:alice": { "type": "user" } },
//!       "resources": {
//!         "thing:/":              { "grant": ["READ", "WRITE"], "revoke": [] },
//!         "thing:/features/keys": { "grant": [], "revoke": ["READ"] }
//!       }
//!     }
//!   }
//! }
//! ```

use crate::{EnforcerError, Permissions, ResourceKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use twinguard_types::{PolicyId, SubjectId};

/// Field of the policy JSON holding the policy id.
pub const POLICY_ID_FIELD: &str = "policyId";

/// Granted and revoked permissions of one entry on one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectedPermissions {
    /// Permissions granted on the resource and everything below it.
    pub grant: Permissions,
    /// Permissions revoked on the resource and everything below it.
    pub revoke: Permissions,
}

impl EffectedPermissions {
    /// Grants `permissions`, revokes nothing.
    #[must_use]
    pub fn granted(permissions: Permissions) -> Self {
        Self {
            grant: permissions,
            revoke: Permissions::empty(),
        }
    }

    /// Revokes `permissions`, grants nothing.
    #[must_use]
    pub fn revoked(permissions: Permissions) -> Self {
        Self {
            grant: Permissions::empty(),
            revoke: permissions,
        }
    }
}

/// Description of a subject inside a policy entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDefinition {
    /// Free-form subject type (e.g. `"user"`, `"generated"`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<String>,
}

/// One labelled entry of a policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyEntry {
    /// Subjects this entry applies to.
    pub subjects: BTreeMap<SubjectId, SubjectDefinition>,
    /// Permissions per resource.
    pub resources: BTreeMap<ResourceKey, EffectedPermissions>,
}

impl PolicyEntry {
    /// Creates an entry for `subjects` without any resource.
    pub fn for_subjects<I, S>(subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SubjectId>,
    {
        Self {
            subjects: subjects
                .into_iter()
                .map(|s| (s.into(), SubjectDefinition::default()))
                .collect(),
            resources: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) the permissions on `resource`.
    #[must_use]
    pub fn with_resource(mut self, resource: ResourceKey, permissions: EffectedPermissions) -> Self {
        self.resources.insert(resource, permissions);
        self
    }
}

/// A resource-path scoped permission document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Identifier of the policy; inline policies may omit it.
    #[serde(rename = "policyId", default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<PolicyId>,
    /// Entries by label.
    #[serde(default)]
    pub entries: BTreeMap<String, PolicyEntry>,
}

impl Policy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new(policy_id: Option<PolicyId>) -> Self {
        Self {
            policy_id,
            entries: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) the entry `label`.
    #[must_use]
    pub fn with_entry(mut self, label: impl Into<String>, entry: PolicyEntry) -> Self {
        self.entries.insert(label.into(), entry);
        self
    }

    /// Parses the JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::InvalidPolicy`] if the value is not an
    /// object, a resource key or permission name is malformed, or an entry
    /// label is empty.
    pub fn from_json(value: &Value) -> Result<Self, EnforcerError> {
        if !value.is_object() {
            return Err(EnforcerError::invalid_policy("expected a JSON object"));
        }
        let policy: Policy = serde_json::from_value(value.clone())
            .map_err(|e| EnforcerError::invalid_policy(e.to_string()))?;
        if policy.entries.keys().any(String::is_empty) {
            return Err(EnforcerError::invalid_policy("entry labels must not be empty"));
        }
        Ok(policy)
    }

    /// Renders the JSON representation.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twinguard_types::JsonPointer;

    #[test]
    fn parses_entries_and_resources() {
        let policy = Policy::from_json(&json!({
            "policyId": "ns:p",
            "entries": {
                "owner": {
                    "subjects": {"alice": {"type": "user"}},
                    "resources": {
                        "thing:/": {"grant": ["READ", "WRITE"], "revoke": []},
                        "thing:/features/keys": {"revoke": ["READ"]}
                    }
                }
            }
        }))
        .expect("valid policy");

        assert_eq!(policy.policy_id.as_ref().map(PolicyId::as_str), Some("ns:p"));
        let owner = &policy.entries["owner"];
        assert_eq!(
            owner.subjects[&SubjectId::new("alice")].subject_type.as_deref(),
            Some("user")
        );
        let keys = ResourceKey::thing(JsonPointer::parse("/features/keys"));
        assert_eq!(owner.resources[&keys], EffectedPermissions::revoked(Permissions::READ));
    }

    #[test]
    fn policy_id_is_optional() {
        let policy = Policy::from_json(&json!({"entries": {}})).expect("valid policy");
        assert!(policy.policy_id.is_none());
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(Policy::from_json(&json!("nope")).is_err());
        assert!(Policy::from_json(&json!({"policyId": "no-namespace"})).is_err());
        assert!(Policy::from_json(&json!({
            "entries": {"e": {"resources": {"thing": {"grant": ["READ"]}}}}
        }))
        .is_err());
        assert!(Policy::from_json(&json!({
            "entries": {"e": {"resources": {"thing:/": {"grant": ["FLY"]}}}}
        }))
        .is_err());
        assert!(Policy::from_json(&json!({"entries": {"": {}}})).is_err());
    }

    #[test]
    fn builder_renders_expected_json() {
        let policy = Policy::new(None).with_entry(
            "default",
            PolicyEntry::for_subjects(["carol"]).with_resource(
                ResourceKey::thing(JsonPointer::root()),
                EffectedPermissions::granted(Permissions::READ),
            ),
        );
        assert_eq!(
            policy.to_json(),
            json!({"entries": {"default": {
                "subjects": {"carol": {}},
                "resources": {"thing:/": {"grant": ["READ"], "revoke": []}}
            }}})
        );
    }
}
