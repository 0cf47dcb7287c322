//! The enforcer abstraction shared by ACL and policy authorization.
//!
//! An [`Enforcer`] is either an [`AclEnforcer`] or a [`PolicyEnforcer`].
//! A Thing is authorized by exactly one of them; callers never need to
//! know which, except for choosing the evaluator that derives the
//! required permissions from a command.

use crate::{AclEnforcer, Permissions, PolicyEnforcer, ResourceKey};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use twinguard_types::{AuthorizationContext, SubjectId};

/// Which authorization model an [`Enforcer`] implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnforcerKind {
    /// Legacy per-Thing access control list.
    Acl,
    /// Resource-path scoped policy.
    Policy,
}

impl EnforcerKind {
    /// Returns the kind as a lowercase string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acl => "acl",
            Self::Policy => "policy",
        }
    }
}

impl fmt::Display for EnforcerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers permission questions about one Thing (or one policy).
#[derive(Debug, Clone)]
pub enum Enforcer {
    /// ACL-backed enforcer.
    Acl(AclEnforcer),
    /// Policy-backed enforcer.
    Policy(PolicyEnforcer),
}

impl Enforcer {
    /// Returns the authorization model of this enforcer.
    #[must_use]
    pub fn kind(&self) -> EnforcerKind {
        match self {
            Self::Acl(_) => EnforcerKind::Acl,
            Self::Policy(_) => EnforcerKind::Policy,
        }
    }

    /// See [`PolicyEnforcer::has_unrestricted_permissions`].
    #[must_use]
    pub fn has_unrestricted_permissions(
        &self,
        resource: &ResourceKey,
        ctx: &AuthorizationContext,
        permissions: Permissions,
    ) -> bool {
        match self {
            Self::Acl(e) => e.has_unrestricted_permissions(resource, ctx, permissions),
            Self::Policy(e) => e.has_unrestricted_permissions(resource, ctx, permissions),
        }
    }

    /// See [`PolicyEnforcer::has_partial_permissions`].
    #[must_use]
    pub fn has_partial_permissions(
        &self,
        resource: &ResourceKey,
        ctx: &AuthorizationContext,
        permissions: Permissions,
    ) -> bool {
        match self {
            Self::Acl(e) => e.has_partial_permissions(resource, ctx, permissions),
            Self::Policy(e) => e.has_partial_permissions(resource, ctx, permissions),
        }
    }

    /// Subjects for which `permissions` take effect on `resource`.
    #[must_use]
    pub fn subjects_with_permission(
        &self,
        resource: &ResourceKey,
        permissions: Permissions,
    ) -> BTreeSet<SubjectId> {
        match self {
            Self::Acl(e) => e.subjects_with_permission(resource, permissions),
            Self::Policy(e) => e.subjects_with_permission(resource, permissions),
        }
    }

    /// Projects `entity` to what `ctx` may see with `permissions`.
    #[must_use]
    pub fn build_filtered_view(
        &self,
        resource: &ResourceKey,
        entity: &Value,
        ctx: &AuthorizationContext,
        always_visible: &[String],
        permissions: Permissions,
    ) -> Value {
        match self {
            Self::Acl(e) => e.build_filtered_view(resource, entity, ctx, always_visible, permissions),
            Self::Policy(e) => {
                e.build_filtered_view(resource, entity, ctx, always_visible, permissions)
            }
        }
    }
}

impl From<AclEnforcer> for Enforcer {
    fn from(e: AclEnforcer) -> Self {
        Self::Acl(e)
    }
}

impl From<PolicyEnforcer> for Enforcer {
    fn from(e: PolicyEnforcer) -> Self {
        Self::Policy(e)
    }
}
