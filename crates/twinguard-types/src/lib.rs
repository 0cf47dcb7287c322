//! Core types for twinguard.
//!
//! This crate provides the identifier and addressing types shared by every
//! layer of the twinguard workspace.
//!
//! # Crate Architecture
//!
//! ```text
//! twinguard-types    (ThingId, SubjectId, JsonPointer, ErrorCode)  ◄── HERE
//!        ↑
//! twinguard-auth     (Permissions, ResourceKey, Acl/Policy enforcers, view filter)
//!        ↑
//! twinguard-runtime  (commands, enforcer cache, coordinator, workers)
//! ```
//!
//! # Example
//!
//! ```
//! use twinguard_types::{AuthorizationContext, JsonPointer, ThingId};
//!
//! let thing = ThingId::new("org.acme:boiler").unwrap();
//! let ctx = AuthorizationContext::new(["nginx:alice"]);
//! let path = JsonPointer::parse("/features/temperature");
//!
//! assert_eq!(thing.namespace(), "org.acme");
//! assert_eq!(ctx.first().unwrap().as_str(), "nginx:alice");
//! assert_eq!(path.root_segment(), Some("features"));
//! ```

mod error;
mod id;
mod pointer;
mod subject;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{IdError, PolicyId, ThingId};
pub use pointer::JsonPointer;
pub use subject::{AuthorizationContext, SubjectId};
