//! Legacy access control lists.
//!
//! An [`AccessControlList`] attaches a permission set to each subject for
//! the whole Thing. There are no paths: a subject either holds a permission
//! on every field or on none. [`AclEnforcer`] answers permission questions
//! against such a list.
//!
//! # JSON Format
//!
//! ```text
//! {
//!   "nginx:alice": { "READ": true, "WRITE": true, "ADMINISTRATE": false },
//!   "nginx:bob":   { "READ": true, "WRITE": false, "ADMINISTRATE": false }
//! }
//! ```

use crate::view::{self, FieldAccess};
use crate::{EnforcerError, Permissions, ResourceKey};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use twinguard_types::{AuthorizationContext, SubjectId};

/// Subject → permission mapping of a legacy Thing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControlList {
    entries: BTreeMap<SubjectId, Permissions>,
}

impl AccessControlList {
    /// Creates an empty ACL.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the legacy JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::InvalidAcl`] if the value is not an object of
    /// permission objects, a flag is not a boolean, or a permission name is
    /// unknown.
    pub fn from_json(value: &Value) -> Result<Self, EnforcerError> {
        let obj = value
            .as_object()
            .ok_or_else(|| EnforcerError::invalid_acl("expected a JSON object"))?;

        let mut entries = BTreeMap::new();
        for (subject, flags) in obj {
            let flags = flags.as_object().ok_or_else(|| {
                EnforcerError::invalid_acl(format!("entry '{subject}' must be an object"))
            })?;
            let mut granted = Permissions::empty();
            for (name, flag) in flags {
                let perm = Permissions::parse(name).ok_or_else(|| {
                    EnforcerError::invalid_acl(format!("unknown permission '{name}'"))
                })?;
                match flag.as_bool() {
                    Some(true) => granted |= perm,
                    Some(false) => {}
                    None => {
                        return Err(EnforcerError::invalid_acl(format!(
                            "permission '{name}' of '{subject}' must be a boolean"
                        )))
                    }
                }
            }
            entries.insert(SubjectId::new(subject.as_str()), granted);
        }
        Ok(Self { entries })
    }

    /// Renders the legacy JSON representation.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let obj: Map<String, Value> = self
            .entries
            .iter()
            .map(|(subject, perms)| (subject.to_string(), Self::entry_to_json(*perms)))
            .collect();
        Value::Object(obj)
    }

    /// Renders one entry's permission flags, e.g. `{"READ": true, ...}`.
    #[must_use]
    pub fn entry_to_json(permissions: Permissions) -> Value {
        let flags: Map<String, Value> = [
            ("READ", Permissions::READ),
            ("WRITE", Permissions::WRITE),
            ("ADMINISTRATE", Permissions::ADMINISTRATE),
        ]
        .into_iter()
        .map(|(name, perm)| (name.to_string(), Value::Bool(permissions.contains(perm))))
        .collect();
        Value::Object(flags)
    }

    /// Sets the permissions of `subject`, replacing any previous entry.
    pub fn set_entry(&mut self, subject: SubjectId, permissions: Permissions) {
        self.entries.insert(subject, permissions);
    }

    /// Returns the permissions of `subject`.
    #[must_use]
    pub fn entry(&self, subject: &SubjectId) -> Option<Permissions> {
        self.entries.get(subject).copied()
    }

    /// Returns `true` if no subject is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of the permissions held by all subjects of `ctx`.
    #[must_use]
    pub fn permissions_of(&self, ctx: &AuthorizationContext) -> Permissions {
        ctx.subjects()
            .iter()
            .filter_map(|s| self.entries.get(s))
            .fold(Permissions::empty(), |acc, p| acc | *p)
    }

    /// Subjects holding every permission in `permissions`.
    #[must_use]
    pub fn subjects_with(&self, permissions: Permissions) -> BTreeSet<SubjectId> {
        self.entries
            .iter()
            .filter(|(_, granted)| granted.contains(permissions))
            .map(|(s, _)| s.clone())
            .collect()
    }
}

/// Enforcer backed by an [`AccessControlList`].
///
/// The resource key of a request is ignored: ACL permissions hold for the
/// whole Thing, so "partial" and "unrestricted" permission coincide.
#[derive(Debug, Clone)]
pub struct AclEnforcer {
    acl: Arc<AccessControlList>,
}

impl AclEnforcer {
    /// Creates an enforcer for `acl`.
    #[must_use]
    pub fn new(acl: AccessControlList) -> Self {
        Self { acl: Arc::new(acl) }
    }

    /// Returns the underlying ACL.
    #[must_use]
    pub fn acl(&self) -> &AccessControlList {
        &self.acl
    }

    /// Returns `true` if the subjects of `ctx` together hold all of
    /// `permissions`.
    #[must_use]
    pub fn has_unrestricted_permissions(
        &self,
        _resource: &ResourceKey,
        ctx: &AuthorizationContext,
        permissions: Permissions,
    ) -> bool {
        !permissions.is_empty() && self.acl.permissions_of(ctx).contains(permissions)
    }

    /// Same as [`has_unrestricted_permissions`](Self::has_unrestricted_permissions).
    #[must_use]
    pub fn has_partial_permissions(
        &self,
        resource: &ResourceKey,
        ctx: &AuthorizationContext,
        permissions: Permissions,
    ) -> bool {
        self.has_unrestricted_permissions(resource, ctx, permissions)
    }

    /// Subjects holding `permissions` on the Thing.
    #[must_use]
    pub fn subjects_with_permission(
        &self,
        _resource: &ResourceKey,
        permissions: Permissions,
    ) -> BTreeSet<SubjectId> {
        self.acl.subjects_with(permissions)
    }

    /// Returns `entity` unchanged if `ctx` holds `permissions`, otherwise
    /// only the always-visible fields.
    #[must_use]
    pub fn build_filtered_view(
        &self,
        resource: &ResourceKey,
        entity: &Value,
        ctx: &AuthorizationContext,
        always_visible: &[String],
        permissions: Permissions,
    ) -> Value {
        let access = AclAccess {
            granted: self.has_unrestricted_permissions(resource, ctx, permissions),
        };
        view::build_view(&access, resource, entity, always_visible)
    }
}

struct AclAccess {
    granted: bool,
}

impl FieldAccess for AclAccess {
    fn unrestricted(&self, _key: &ResourceKey) -> bool {
        self.granted
    }

    fn partial(&self, _key: &ResourceKey) -> bool {
        self.granted
    }

    fn effective(&self, _key: &ResourceKey) -> bool {
        self.granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use twinguard_types::JsonPointer;

    fn root() -> ResourceKey {
        ResourceKey::thing(JsonPointer::root())
    }

    fn acl() -> AccessControlList {
        AccessControlList::from_json(&json!({
            "alice": {"READ": true, "WRITE": true, "ADMINISTRATE": false},
            "bob": {"READ": true, "WRITE": false, "ADMINISTRATE": false},
            "admin": {"READ": false, "WRITE": false, "ADMINISTRATE": true}
        }))
        .expect("valid acl")
    }

    #[test]
    fn parse_and_render_roundtrip() {
        let acl = acl();
        assert_eq!(
            acl.entry(&"alice".into()),
            Some(Permissions::READ | Permissions::WRITE)
        );
        let reparsed = AccessControlList::from_json(&acl.to_json()).expect("reparse");
        assert_eq!(reparsed, acl);
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!(AccessControlList::from_json(&json!([])).is_err());
        assert!(AccessControlList::from_json(&json!({"a": true})).is_err());
        assert!(AccessControlList::from_json(&json!({"a": {"READ": "yes"}})).is_err());
        assert!(AccessControlList::from_json(&json!({"a": {"EXECUTE": true}})).is_err());
    }

    #[test]
    fn write_without_administrate_is_not_enough_for_acl_changes() {
        let enforcer = AclEnforcer::new(acl());
        let ctx = AuthorizationContext::new(["alice"]);
        assert!(enforcer.has_unrestricted_permissions(&root(), &ctx, Permissions::WRITE));
        assert!(!enforcer.has_unrestricted_permissions(
            &root(),
            &ctx,
            Permissions::WRITE | Permissions::ADMINISTRATE
        ));
    }

    #[test]
    fn permissions_of_multiple_subjects_are_combined() {
        let enforcer = AclEnforcer::new(acl());
        let ctx = AuthorizationContext::new(["alice", "admin"]);
        assert!(enforcer.has_unrestricted_permissions(
            &root(),
            &ctx,
            Permissions::WRITE | Permissions::ADMINISTRATE
        ));
    }

    #[test]
    fn unknown_subject_has_nothing() {
        let enforcer = AclEnforcer::new(acl());
        let ctx = AuthorizationContext::new(["mallory"]);
        assert!(!enforcer.has_partial_permissions(&root(), &ctx, Permissions::READ));
        assert!(!enforcer.has_unrestricted_permissions(
            &root(),
            &AuthorizationContext::empty(),
            Permissions::READ
        ));
    }

    #[test]
    fn subjects_with_read() {
        let enforcer = AclEnforcer::new(acl());
        let readers = enforcer.subjects_with_permission(&root(), Permissions::READ);
        let names: Vec<&str> = readers.iter().map(SubjectId::as_str).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn view_is_all_or_nothing() {
        let enforcer = AclEnforcer::new(acl());
        let thing = json!({"thingId": "ns:t", "attributes": {"a": 1}});
        let always = vec!["thingId".to_string()];

        let full = enforcer.build_filtered_view(
            &root(),
            &thing,
            &AuthorizationContext::new(["bob"]),
            &always,
            Permissions::READ,
        );
        assert_eq!(full, thing);

        let stripped = enforcer.build_filtered_view(
            &root(),
            &thing,
            &AuthorizationContext::new(["admin"]),
            &always,
            Permissions::READ,
        );
        assert_eq!(stripped, json!({"thingId": "ns:t"}));
    }
}
