//! Cache keys and their resolution from serialized entity identities.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;
use twinguard_auth::{POLICY_RESOURCE_TYPE, THING_RESOURCE_TYPE};
use twinguard_types::{ErrorCode, IdError, JsonPointer, PolicyId, ThingId};
use uuid::Uuid;

/// Error resolving a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheKeyError {
    /// The serialized key has no `type:` prefix.
    #[error("cache key '{0}' must have the form 'type:id'")]
    MissingType(String),

    /// The entity id part is not a valid namespaced id.
    #[error("cache key '{key}' has an invalid entity id: {source}")]
    InvalidId {
        /// The serialized key.
        key: String,
        /// Why the id was rejected.
        #[source]
        source: IdError,
    },
}

impl ErrorCode for CacheKeyError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingType(_) => "CACHE_KEY_MISSING_TYPE",
            Self::InvalidId { .. } => "CACHE_KEY_INVALID_ID",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Lookup hints carried alongside a key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupContext {
    /// Correlation id of the command that caused the lookup.
    pub correlation_id: Option<Uuid>,
    /// Fields a loader may restrict its projection to.
    pub selected_fields: Option<Vec<JsonPointer>>,
}

/// Identity of a cached entity: `(resource type, entity id)`.
///
/// Equality and hashing use type and id only; the [`LookupContext`] does
/// not change which entry a key addresses.
///
/// # Example
///
/// ```
/// use twinguard_runtime::cache::{CacheKey, LookupContext};
/// use twinguard_types::ThingId;
///
/// let id = ThingId::new("ns:lamp").unwrap();
/// let plain = CacheKey::thing(&id);
/// let hinted = CacheKey::thing(&id).with_context(LookupContext::default());
///
/// assert_eq!(plain, hinted);
/// assert_eq!(plain.to_string(), "thing:ns:lamp");
/// assert_eq!("thing:ns:lamp".parse::<CacheKey>().unwrap(), plain);
/// ```
#[derive(Debug, Clone)]
pub struct CacheKey {
    resource_type: String,
    id: String,
    context: Option<LookupContext>,
}

impl CacheKey {
    /// Creates a key without lookup context.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            context: None,
        }
    }

    /// Key of a Thing; also the enforcer key of an ACL-governed Thing.
    #[must_use]
    pub fn thing(thing_id: &ThingId) -> Self {
        Self::new(THING_RESOURCE_TYPE, thing_id.as_str())
    }

    /// Key of a Policy.
    #[must_use]
    pub fn policy(policy_id: &PolicyId) -> Self {
        Self::new(POLICY_RESOURCE_TYPE, policy_id.as_str())
    }

    /// Attaches lookup hints.
    #[must_use]
    pub fn with_context(mut self, context: LookupContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the lookup hints, if any.
    #[must_use]
    pub fn context(&self) -> Option<&LookupContext> {
        self.context.as_ref()
    }

    /// Returns `true` if the key addresses a Thing.
    #[must_use]
    pub fn is_thing(&self) -> bool {
        self.resource_type == THING_RESOURCE_TYPE
    }

    /// Returns `true` if the key addresses a Policy.
    #[must_use]
    pub fn is_policy(&self) -> bool {
        self.resource_type == POLICY_RESOURCE_TYPE
    }

    /// Parses the id as a Thing id.
    ///
    /// # Errors
    ///
    /// Returns [`CacheKeyError::InvalidId`] if the id is not namespaced.
    pub fn thing_id(&self) -> Result<ThingId, CacheKeyError> {
        ThingId::new(self.id.as_str()).map_err(|source| self.invalid(source))
    }

    /// Parses the id as a Policy id.
    ///
    /// # Errors
    ///
    /// Returns [`CacheKeyError::InvalidId`] if the id is not namespaced.
    pub fn policy_id(&self) -> Result<PolicyId, CacheKeyError> {
        PolicyId::new(self.id.as_str()).map_err(|source| self.invalid(source))
    }

    fn invalid(&self, source: IdError) -> CacheKeyError {
        CacheKeyError::InvalidId {
            key: self.to_string(),
            source,
        }
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.resource_type == other.resource_type && self.id == other.id
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource_type.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// Resolves a serialized entity identity (`type:id`) into a key.
///
/// The type is everything before the first `:`; the id may contain
/// further colons (`thing:ns:name`).
impl FromStr for CacheKey {
    type Err = CacheKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((resource_type, id)) if !resource_type.is_empty() && !id.is_empty() => {
                Ok(Self::new(resource_type, id))
            }
            _ => Err(CacheKeyError::MissingType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use twinguard_types::assert_error_codes;

    #[test]
    fn context_does_not_affect_identity() {
        let id = ThingId::new("ns:t").expect("valid thing id");
        let mut set = HashSet::new();
        set.insert(CacheKey::thing(&id));
        let hinted = CacheKey::thing(&id).with_context(LookupContext {
            correlation_id: Some(Uuid::new_v4()),
            selected_fields: Some(vec![JsonPointer::parse("/attributes")]),
        });
        assert!(set.contains(&hinted));
        assert!(hinted.context().is_some());
    }

    #[test]
    fn thing_and_policy_keys_differ() {
        let thing = CacheKey::thing(&ThingId::new("ns:t").expect("valid thing id"));
        let policy = CacheKey::policy(&PolicyId::new("ns:t").expect("valid policy id"));
        assert_ne!(thing, policy);
        assert!(thing.is_thing() && !thing.is_policy());
        assert!(policy.is_policy());
        assert_eq!(policy.policy_id().map(|p| p.to_string()).ok(), Some("ns:t".into()));
    }

    #[test]
    fn resolve_serialized_keys() {
        let key: CacheKey = "policy:org.acme:default".parse().expect("parse key");
        assert_eq!(key.resource_type(), "policy");
        assert_eq!(key.id(), "org.acme:default");

        assert!("thing".parse::<CacheKey>().is_err());
        assert!(":ns:t".parse::<CacheKey>().is_err());
        assert!("thing:".parse::<CacheKey>().is_err());
    }

    #[test]
    fn invalid_ids_are_reported() {
        let key = CacheKey::new("thing", "no-namespace");
        let err = key.thing_id().expect_err("id without namespace");
        assert_error_codes(&[err, CacheKeyError::MissingType("x".into())], "CACHE_KEY_");
    }
}
