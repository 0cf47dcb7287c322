//! Resource keys.
//!
//! A [`ResourceKey`] is the pair (resource type, path) that a permission is
//! granted on or checked against, e.g. `thing:/features/temp`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use twinguard_types::{ErrorCode, JsonPointer};

/// Resource type of Thing resources.
pub const THING_RESOURCE_TYPE: &str = "thing";

/// Resource type of Policy resources.
pub const POLICY_RESOURCE_TYPE: &str = "policy";

/// Error returned for a malformed `type:/path` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid resource key '{0}': expected 'type:/path'")]
pub struct ResourceKeyError(pub String);

impl ErrorCode for ResourceKeyError {
    fn code(&self) -> &'static str {
        "RESOURCE_KEY_INVALID"
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Location inside an entity a permission applies to.
///
/// # Example
///
/// ```
/// use twinguard_auth::ResourceKey;
///
/// let key: ResourceKey = "thing:/features/temp".parse().unwrap();
/// assert_eq!(key.resource_type(), "thing");
/// assert_eq!(key.path().to_string(), "/features/temp");
/// assert_eq!(key.to_string(), "thing:/features/temp");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    resource_type: String,
    path: JsonPointer,
}

impl ResourceKey {
    /// Creates a key from type and path.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, path: JsonPointer) -> Self {
        Self {
            resource_type: resource_type.into(),
            path,
        }
    }

    /// Creates a `thing` resource key.
    #[must_use]
    pub fn thing(path: JsonPointer) -> Self {
        Self::new(THING_RESOURCE_TYPE, path)
    }

    /// Creates a `policy` resource key.
    #[must_use]
    pub fn policy(path: JsonPointer) -> Self {
        Self::new(POLICY_RESOURCE_TYPE, path)
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the path within the resource.
    #[must_use]
    pub fn path(&self) -> &JsonPointer {
        &self.path
    }

    /// Returns the key of the child field `segment`.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            path: self.path.child(segment),
        }
    }

    /// Returns `true` if both keys share the type and `self` is `other` or
    /// one of its ancestors.
    #[must_use]
    pub fn covers(&self, other: &ResourceKey) -> bool {
        self.resource_type == other.resource_type && self.path.is_prefix_of(&other.path)
    }

    /// Returns `true` if both keys share the type and `self` lies strictly
    /// below `ancestor`.
    #[must_use]
    pub fn is_below(&self, ancestor: &ResourceKey) -> bool {
        self.resource_type == ancestor.resource_type && ancestor.path.is_ancestor_of(&self.path)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.path)
    }
}

impl FromStr for ResourceKey {
    type Err = ResourceKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((ty, path)) if !ty.is_empty() && (path.is_empty() || path.starts_with('/')) => {
                Ok(Self::new(ty, JsonPointer::parse(path)))
            }
            _ => Err(ResourceKeyError(s.to_string())),
        }
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = ResourceKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}
