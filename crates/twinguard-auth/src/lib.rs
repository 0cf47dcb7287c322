//! Authorization primitives for twinguard.
//!
//! This crate answers one question: may a set of subjects exercise a set of
//! permissions on a resource of a Thing? It knows nothing about commands,
//! caches or workers; those live in `twinguard-runtime`.
//!
//! # Two Authorization Models
//!
//! | Model | Type | Granularity |
//! |-------|------|-------------|
//! | Legacy ACL | [`AclEnforcer`] | Whole Thing, per subject |
//! | Policy | [`PolicyEnforcer`] | Resource path, grant/revoke per entry |
//!
//! Both are wrapped by [`Enforcer`], which also builds field-filtered
//! views of entities for read responses.
//!
//! # Crate Architecture
//!
//! ```text
//! twinguard-types    (ThingId, SubjectId, JsonPointer, ErrorCode)
//!        ↑
//! twinguard-auth     (Permissions, ResourceKey, Acl/Policy enforcers)  ◄── THIS CRATE
//!        ↑
//! twinguard-runtime  (commands, enforcer cache, coordinator, workers)
//! ```
//!
//! # Design Principles
//!
//! - **Revoke wins**: a revoke on a resource cannot be undone by a grant
//!   on the same resource or below it
//! - **Sets, not levels**: holding `ADMINISTRATE` never implies `WRITE`

pub mod acl;
pub mod decision;
pub mod enforcer;
pub mod error;
pub mod permission;
pub mod policy;
pub mod policy_enforcer;
pub mod resource;
mod view;

pub use acl::{AccessControlList, AclEnforcer};
pub use decision::AuthorizationDecision;
pub use enforcer::{Enforcer, EnforcerKind};
pub use error::EnforcerError;
pub use permission::Permissions;
pub use policy::{EffectedPermissions, Policy, PolicyEntry, SubjectDefinition, POLICY_ID_FIELD};
pub use policy_enforcer::PolicyEnforcer;
pub use resource::{ResourceKey, ResourceKeyError, POLICY_RESOURCE_TYPE, THING_RESOURCE_TYPE};
