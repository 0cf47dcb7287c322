//! Namespaced entity identifiers.
//!
//! Things and Policies are addressed by `namespace:name` identifiers. The
//! namespace may be empty (`:name`), the name may not. Both halves are kept
//! as given; comparison is exact.

use crate::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing a namespaced identifier fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The identifier has no `:` between namespace and name.
    #[error("entity id '{0}' must have the form 'namespace:name'")]
    MissingSeparator(String),

    /// The part after the first `:` is empty.
    #[error("entity id '{0}' has an empty name")]
    EmptyName(String),

    /// The namespace contains characters outside `[A-Za-z0-9._-]`.
    #[error("entity id '{id}' has an invalid namespace '{namespace}'")]
    InvalidNamespace {
        /// The full identifier.
        id: String,
        /// The offending namespace.
        namespace: String,
    },

    /// The name contains a `/`, which would clash with resource paths.
    #[error("entity id '{0}' must not contain '/' in its name")]
    InvalidName(String),
}

impl ErrorCode for IdError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingSeparator(_) => "ID_MISSING_SEPARATOR",
            Self::EmptyName(_) => "ID_EMPTY_NAME",
            Self::InvalidNamespace { .. } => "ID_INVALID_NAMESPACE",
            Self::InvalidName(_) => "ID_INVALID_NAME",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

fn validate(raw: &str) -> Result<(), IdError> {
    let Some((namespace, name)) = raw.split_once(':') else {
        return Err(IdError::MissingSeparator(raw.to_string()));
    };
    if name.is_empty() {
        return Err(IdError::EmptyName(raw.to_string()));
    }
    if !namespace
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(IdError::InvalidNamespace {
            id: raw.to_string(),
            namespace: namespace.to_string(),
        });
    }
    if name.contains('/') {
        return Err(IdError::InvalidName(raw.to_string()));
    }
    Ok(())
}

macro_rules! namespaced_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parses and validates a `namespace:name` identifier.
            ///
            /// # Errors
            ///
            /// Returns [`IdError`] if the identifier is malformed.
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                validate(&raw)?;
                Ok(Self(raw))
            }

            /// Returns the namespace part (may be empty).
            #[must_use]
            pub fn namespace(&self) -> &str {
                self.0.split_once(':').map_or("", |(ns, _)| ns)
            }

            /// Returns the name part.
            #[must_use]
            pub fn name(&self) -> &str {
                self.0.split_once(':').map_or(self.0.as_str(), |(_, n)| n)
            }

            /// Returns the full identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

namespaced_id!(
    /// Identifier of a Thing (digital twin).
    ///
    /// ```
    /// use twinguard_types::ThingId;
    ///
    /// let id = ThingId::new("org.acme:sensor-1").unwrap();
    /// assert_eq!(id.namespace(), "org.acme");
    /// assert_eq!(id.name(), "sensor-1");
    /// assert!(ThingId::new("no-namespace").is_err());
    /// ```
    ThingId
);

namespaced_id!(
    /// Identifier of a Policy.
    PolicyId
);

impl From<ThingId> for PolicyId {
    /// A Thing's default policy shares the Thing's identifier.
    fn from(id: ThingId) -> Self {
        Self(id.0)
    }
}
