//! Policy-based enforcement.
//!
//! # Evaluation
//!
//! For a set of subjects `S`, a key `k` and a permission `p`:
//!
//! ```text
//! granted(k)      = some entry of S grants p on k or an ancestor of k
//! revoked(k)      = some entry of S revokes p on k or an ancestor of k
//! effective(k)    = granted(k) && !revoked(k)
//!
//! unrestricted(k) = effective(k) && no entry of S revokes p strictly below k
//! partial(k)      = effective(k) || effective(g) for some grant g strictly below k
//! ```
//!
//! A revoke therefore always wins over a grant on the same or a deeper
//! level, and a grant below a revoke cannot re-grant.

use crate::policy::{EffectedPermissions, Policy};
use crate::view::{self, FieldAccess};
use crate::{Permissions, ResourceKey};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use twinguard_types::{AuthorizationContext, PolicyId, SubjectId};

#[derive(Debug)]
struct Rule {
    subjects: BTreeSet<SubjectId>,
    resource: ResourceKey,
    permissions: EffectedPermissions,
}

#[derive(Debug)]
struct Rules {
    policy_id: Option<PolicyId>,
    rules: Vec<Rule>,
}

/// Enforcer backed by a [`Policy`].
///
/// Cloning is cheap; the flattened rule list is shared.
///
/// # Example
///
/// ```
/// use twinguard_auth::{
///     EffectedPermissions, Permissions, Policy, PolicyEnforcer, PolicyEntry, ResourceKey,
/// };
/// use twinguard_types::{AuthorizationContext, JsonPointer};
///
/// let temp = ResourceKey::thing(JsonPointer::parse("/features/temp"));
/// let policy = Policy::new(None).with_entry(
///     "reader",
///     PolicyEntry::for_subjects(["bob"])
///         .with_resource(temp.clone(), EffectedPermissions::granted(Permissions::READ)),
/// );
/// let enforcer = PolicyEnforcer::new(&policy);
/// let bob = AuthorizationContext::new(["bob"]);
/// let root = ResourceKey::thing(JsonPointer::root());
///
/// assert!(enforcer.has_partial_permissions(&root, &bob, Permissions::READ));
/// assert!(!enforcer.has_unrestricted_permissions(&root, &bob, Permissions::READ));
/// assert!(enforcer.has_unrestricted_permissions(&temp, &bob, Permissions::READ));
/// ```
#[derive(Debug, Clone)]
pub struct PolicyEnforcer {
    inner: Arc<Rules>,
}

impl PolicyEnforcer {
    /// Builds an enforcer from `policy`.
    #[must_use]
    pub fn new(policy: &Policy) -> Self {
        let rules = policy
            .entries
            .values()
            .flat_map(|entry| {
                let subjects: BTreeSet<SubjectId> = entry.subjects.keys().cloned().collect();
                entry.resources.iter().map(move |(resource, permissions)| Rule {
                    subjects: subjects.clone(),
                    resource: resource.clone(),
                    permissions: *permissions,
                })
            })
            .collect();

        Self {
            inner: Arc::new(Rules {
                policy_id: policy.policy_id.clone(),
                rules,
            }),
        }
    }

    /// Returns the id of the policy this enforcer was built from.
    #[must_use]
    pub fn policy_id(&self) -> Option<&PolicyId> {
        self.inner.policy_id.as_ref()
    }

    /// Returns `true` if `ctx` holds every permission of `permissions` on
    /// `resource` and on everything below it.
    #[must_use]
    pub fn has_unrestricted_permissions(
        &self,
        resource: &ResourceKey,
        ctx: &AuthorizationContext,
        permissions: Permissions,
    ) -> bool {
        !permissions.is_empty()
            && permissions
                .iter()
                .all(|p| self.unrestricted(ctx.subjects(), resource, p))
    }

    /// Returns `true` if `ctx` holds every permission of `permissions` on
    /// `resource` or on at least one location below it.
    #[must_use]
    pub fn has_partial_permissions(
        &self,
        resource: &ResourceKey,
        ctx: &AuthorizationContext,
        permissions: Permissions,
    ) -> bool {
        !permissions.is_empty()
            && permissions
                .iter()
                .all(|p| self.partial(ctx.subjects(), resource, p))
    }

    /// Subjects for which all of `permissions` take effect on `resource`.
    #[must_use]
    pub fn subjects_with_permission(
        &self,
        resource: &ResourceKey,
        permissions: Permissions,
    ) -> BTreeSet<SubjectId> {
        if permissions.is_empty() {
            return BTreeSet::new();
        }
        let candidates: BTreeSet<&SubjectId> = self
            .inner
            .rules
            .iter()
            .flat_map(|r| r.subjects.iter())
            .collect();

        candidates
            .into_iter()
            .filter(|subject| {
                let single = std::slice::from_ref(*subject);
                permissions
                    .iter()
                    .all(|p| self.effective(single, resource, p))
            })
            .cloned()
            .collect()
    }

    /// Projects `entity` (located at `resource`) to the fields `ctx` holds
    /// `permissions` on, plus the `always_visible` top-level fields.
    #[must_use]
    pub fn build_filtered_view(
        &self,
        resource: &ResourceKey,
        entity: &Value,
        ctx: &AuthorizationContext,
        always_visible: &[String],
        permissions: Permissions,
    ) -> Value {
        let access = PolicyAccess {
            enforcer: self,
            subjects: ctx.subjects(),
            permissions,
        };
        view::build_view(&access, resource, entity, always_visible)
    }

    fn applicable<'a>(&'a self, subjects: &'a [SubjectId]) -> impl Iterator<Item = &'a Rule> + 'a {
        self.inner
            .rules
            .iter()
            .filter(move |r| subjects.iter().any(|s| r.subjects.contains(s)))
    }

    fn effective(&self, subjects: &[SubjectId], key: &ResourceKey, p: Permissions) -> bool {
        let mut granted = false;
        for rule in self.applicable(subjects).filter(|r| r.resource.covers(key)) {
            if rule.permissions.revoke.contains(p) {
                return false;
            }
            granted |= rule.permissions.grant.contains(p);
        }
        granted
    }

    fn unrestricted(&self, subjects: &[SubjectId], key: &ResourceKey, p: Permissions) -> bool {
        self.effective(subjects, key, p)
            && !self
                .applicable(subjects)
                .any(|r| r.resource.is_below(key) && r.permissions.revoke.contains(p))
    }

    fn partial(&self, subjects: &[SubjectId], key: &ResourceKey, p: Permissions) -> bool {
        self.effective(subjects, key, p)
            || self
                .applicable(subjects)
                .filter(|r| r.resource.is_below(key) && r.permissions.grant.contains(p))
                .any(|r| self.effective(subjects, &r.resource, p))
    }
}

struct PolicyAccess<'a> {
    enforcer: &'a PolicyEnforcer,
    subjects: &'a [SubjectId],
    permissions: Permissions,
}

impl PolicyAccess<'_> {
    fn all(&self, check: impl Fn(Permissions) -> bool) -> bool {
        !self.permissions.is_empty() && self.permissions.iter().all(check)
    }
}

impl FieldAccess for PolicyAccess<'_> {
    fn unrestricted(&self, key: &ResourceKey) -> bool {
        self.all(|p| self.enforcer.unrestricted(self.subjects, key, p))
    }

    fn partial(&self, key: &ResourceKey) -> bool {
        self.all(|p| self.enforcer.partial(self.subjects, key, p))
    }

    fn effective(&self, key: &ResourceKey) -> bool {
        self.all(|p| self.enforcer.effective(self.subjects, key, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PolicyEntry;
    use serde_json::json;
    use twinguard_types::JsonPointer;

    fn key(path: &str) -> ResourceKey {
        ResourceKey::thing(JsonPointer::parse(path))
    }

    fn ctx(subjects: &[&str]) -> AuthorizationContext {
        AuthorizationContext::new(subjects.iter().copied())
    }

    /// alice: READ|WRITE on /, READ revoked on /attributes/secret
    /// bob:   READ on /features/temp
    /// eve:   READ revoked on /, READ granted on /features (cannot re-grant)
    fn enforcer() -> PolicyEnforcer {
        let policy = Policy::new(None)
            .with_entry(
                "owner",
                PolicyEntry::for_subjects(["alice"])
                    .with_resource(
                        key("/"),
                        EffectedPermissions::granted(Permissions::READ | Permissions::WRITE),
                    )
                    .with_resource(
                        key("/attributes/secret"),
                        EffectedPermissions::revoked(Permissions::READ),
                    ),
            )
            .with_entry(
                "temp-reader",
                PolicyEntry::for_subjects(["bob"]).with_resource(
                    key("/features/temp"),
                    EffectedPermissions::granted(Permissions::READ),
                ),
            )
            .with_entry(
                "blocked",
                PolicyEntry::for_subjects(["eve"])
                    .with_resource(key("/"), EffectedPermissions::revoked(Permissions::READ))
                    .with_resource(
                        key("/features"),
                        EffectedPermissions::granted(Permissions::READ),
                    ),
            );
        PolicyEnforcer::new(&policy)
    }

    #[test]
    fn grant_is_inherited_downwards() {
        let e = enforcer();
        assert!(e.has_unrestricted_permissions(&key("/features/x"), &ctx(&["alice"]), Permissions::WRITE));
        assert!(e.has_unrestricted_permissions(
            &key("/features/temp/properties"),
            &ctx(&["bob"]),
            Permissions::READ
        ));
    }

    #[test]
    fn revoke_below_prevents_unrestricted_but_not_partial() {
        let e = enforcer();
        let alice = ctx(&["alice"]);
        assert!(!e.has_unrestricted_permissions(&key("/"), &alice, Permissions::READ));
        assert!(e.has_partial_permissions(&key("/"), &alice, Permissions::READ));
        assert!(!e.has_partial_permissions(&key("/attributes/secret"), &alice, Permissions::READ));
        assert!(e.has_unrestricted_permissions(&key("/"), &alice, Permissions::WRITE));
    }

    #[test]
    fn partial_from_deeper_grant() {
        let e = enforcer();
        let bob = ctx(&["bob"]);
        assert!(e.has_partial_permissions(&key("/"), &bob, Permissions::READ));
        assert!(e.has_partial_permissions(&key("/features"), &bob, Permissions::READ));
        assert!(!e.has_partial_permissions(&key("/attributes"), &bob, Permissions::READ));
        assert!(!e.has_partial_permissions(&key("/"), &bob, Permissions::WRITE));
    }

    #[test]
    fn revoke_on_ancestor_cannot_be_regranted() {
        let e = enforcer();
        let eve = ctx(&["eve"]);
        assert!(!e.has_partial_permissions(&key("/"), &eve, Permissions::READ));
        assert!(!e.has_unrestricted_permissions(&key("/features"), &eve, Permissions::READ));
    }

    #[test]
    fn revoke_of_any_subject_in_context_wins() {
        let e = enforcer();
        assert!(!e.has_partial_permissions(&key("/features/temp"), &ctx(&["bob", "eve"]), Permissions::READ));
    }

    #[test]
    fn multiple_permissions_must_all_hold() {
        let e = enforcer();
        assert!(!e.has_unrestricted_permissions(
            &key("/features"),
            &ctx(&["alice"]),
            Permissions::WRITE | Permissions::ADMINISTRATE
        ));
        assert!(!e.has_unrestricted_permissions(&key("/"), &ctx(&["alice"]), Permissions::empty()));
    }

    #[test]
    fn unknown_resource_type_is_not_covered() {
        let e = enforcer();
        let policy_root = ResourceKey::policy(JsonPointer::root());
        assert!(!e.has_partial_permissions(&policy_root, &ctx(&["alice"]), Permissions::READ));
    }

    #[test]
    fn subjects_with_read() {
        let e = enforcer();
        let root_readers: Vec<String> = e
            .subjects_with_permission(&key("/"), Permissions::READ)
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(root_readers, vec!["alice"]);

        let temp_readers: Vec<String> = e
            .subjects_with_permission(&key("/features/temp"), Permissions::READ)
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(temp_readers, vec!["alice", "bob"]);
    }

    #[test]
    fn filtered_view_for_partial_reader() {
        let e = enforcer();
        let thing = json!({
            "thingId": "ns:t",
            "policyId": "ns:t",
            "attributes": {"location": "hall", "secret": "s3cr3t"},
            "features": {"temp": {"properties": {"value": 21}}, "lamp": {"properties": {"on": true}}}
        });
        let always = vec!["thingId".to_string()];

        let bob_view = e.build_filtered_view(&key("/"), &thing, &ctx(&["bob"]), &always, Permissions::READ);
        assert_eq!(
            bob_view,
            json!({"thingId": "ns:t", "features": {"temp": {"properties": {"value": 21}}}})
        );

        let alice_view =
            e.build_filtered_view(&key("/"), &thing, &ctx(&["alice"]), &always, Permissions::READ);
        assert_eq!(alice_view["attributes"], json!({"location": "hall"}));
        assert_eq!(alice_view["features"], thing["features"]);

        let again =
            e.build_filtered_view(&key("/"), &alice_view, &ctx(&["alice"]), &always, Permissions::READ);
        assert_eq!(again, alice_view);
    }

    #[test]
    fn filtered_view_of_sub_resource() {
        let e = enforcer();
        let features = json!({"temp": {"properties": {"value": 21}}, "lamp": {}});
        let view = e.build_filtered_view(&key("/features"), &features, &ctx(&["bob"]), &[], Permissions::READ);
        assert_eq!(view, json!({"temp": {"properties": {"value": 21}}}));
    }
}
