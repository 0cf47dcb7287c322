//! Authorization subjects.
//!
//! A [`SubjectId`] names one identity a requester can act as (a user, a
//! group, an integration client, ...). An [`AuthorizationContext`] is the
//! ordered list of all subjects a single request is made with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an authorization subject, e.g. `"nginx:alice"`.
///
/// Subject identifiers are opaque; two subjects are the same iff their
/// strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a subject identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The subjects a request is authorized as, in priority order.
///
/// The first subject is the *default subject*: it becomes the sole reader
/// of a Thing created without any permission information. Duplicates are
/// dropped on construction, keeping the first occurrence.
///
/// # Example
///
/// ```
/// use twinguard_types::{AuthorizationContext, SubjectId};
///
/// let ctx = AuthorizationContext::new(["carol", "dave", "carol"]);
/// assert_eq!(ctx.len(), 2);
/// assert_eq!(ctx.first(), Some(&SubjectId::new("carol")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SubjectId>", into = "Vec<SubjectId>")]
pub struct AuthorizationContext {
    subjects: Vec<SubjectId>,
}

impl AuthorizationContext {
    /// Creates a context from subjects in priority order.
    pub fn new<I, S>(subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SubjectId>,
    {
        let mut unique: Vec<SubjectId> = Vec::new();
        for subject in subjects {
            let subject = subject.into();
            if !unique.contains(&subject) {
                unique.push(subject);
            }
        }
        Self { subjects: unique }
    }

    /// Creates a context without any subject.
    ///
    /// An empty context is never granted anything by an enforcer.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the highest-priority subject, if any.
    #[must_use]
    pub fn first(&self) -> Option<&SubjectId> {
        self.subjects.first()
    }

    /// Returns all subjects in priority order.
    #[must_use]
    pub fn subjects(&self) -> &[SubjectId] {
        &self.subjects
    }

    /// Returns `true` if `subject` is part of this context.
    #[must_use]
    pub fn contains(&self, subject: &SubjectId) -> bool {
        self.subjects.contains(subject)
    }

    /// Number of distinct subjects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// Returns `true` if the context holds no subject.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl From<Vec<SubjectId>> for AuthorizationContext {
    fn from(subjects: Vec<SubjectId>) -> Self {
        Self::new(subjects)
    }
}

impl From<AuthorizationContext> for Vec<SubjectId> {
    fn from(ctx: AuthorizationContext) -> Self {
        ctx.subjects
    }
}
