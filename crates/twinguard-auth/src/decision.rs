//! Authorization decision types.
//!
//! An [`AuthorizationDecision`] is what an evaluator returns for one
//! command. It carries no runtime types; the runtime maps a
//! [`Denied`](AuthorizationDecision::Denied) decision to the
//! command-specific error.

use std::collections::BTreeSet;
use twinguard_types::SubjectId;

/// Result of evaluating a command against an enforcer.
///
/// # Example
///
/// ```
/// use twinguard_auth::AuthorizationDecision;
///
/// let denied = AuthorizationDecision::denied("missing WRITE");
/// assert!(denied.is_denied());
/// assert_eq!(denied.status_str(), "denied");
///
/// let ok = AuthorizationDecision::authorized(["alice"]);
/// assert!(ok.is_authorized());
/// assert_eq!(ok.read_subjects().map(|s| s.len()), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// The command may proceed.
    Authorized {
        /// Subjects allowed to read the resulting change.
        read_subjects: BTreeSet<SubjectId>,
    },
    /// The command must be rejected.
    Denied {
        /// Why the command was rejected; used in logs only.
        reason: String,
    },
}

impl AuthorizationDecision {
    /// Creates an authorized decision.
    pub fn authorized<I, S>(read_subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SubjectId>,
    {
        Self::Authorized {
            read_subjects: read_subjects.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a denied decision.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the command may proceed.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized { .. })
    }

    /// Returns `true` if the command must be rejected.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    /// Read-subjects of an authorized decision.
    #[must_use]
    pub fn read_subjects(&self) -> Option<&BTreeSet<SubjectId>> {
        match self {
            Self::Authorized { read_subjects } => Some(read_subjects),
            Self::Denied { .. } => None,
        }
    }

    /// Returns the status as a string ("authorized", "denied").
    #[must_use]
    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Authorized { .. } => "authorized",
            Self::Denied { .. } => "denied",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorized_helpers() {
        let d = AuthorizationDecision::authorized(["a", "b", "a"]);
        assert!(d.is_authorized());
        assert!(!d.is_denied());
        assert_eq!(d.status_str(), "authorized");
        assert_eq!(d.read_subjects().map(BTreeSet::len), Some(2));
    }

    #[test]
    fn denied_helpers() {
        let d = AuthorizationDecision::denied("nope");
        assert!(d.is_denied());
        assert_eq!(d.read_subjects(), None);
        assert_eq!(
            d,
            AuthorizationDecision::Denied {
                reason: "nope".into()
            }
        );
    }

    #[test]
    fn authorized_without_subjects() {
        let d = AuthorizationDecision::authorized(Vec::<SubjectId>::new());
        assert!(d.read_subjects().is_some_and(BTreeSet::is_empty));
    }
}
