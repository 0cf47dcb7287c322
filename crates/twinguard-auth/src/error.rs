//! Errors raised while building enforcers from raw JSON.

use thiserror::Error;
use twinguard_types::ErrorCode;

/// Error building an ACL or Policy from its JSON representation.
///
/// # Error Codes
///
/// | Variant | Code |
/// |---------|------|
/// | [`EnforcerError::InvalidAcl`] | `AUTH_INVALID_ACL` |
/// | [`EnforcerError::InvalidPolicy`] | `AUTH_INVALID_POLICY` |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnforcerError {
    /// The ACL JSON is not an object of `subject -> {PERMISSION: bool}`.
    #[error("invalid access control list: {reason}")]
    InvalidAcl {
        /// What is wrong with the ACL.
        reason: String,
    },

    /// The policy JSON does not describe a valid policy.
    #[error("invalid policy: {reason}")]
    InvalidPolicy {
        /// What is wrong with the policy.
        reason: String,
    },
}

impl EnforcerError {
    /// Creates an invalid ACL error.
    pub fn invalid_acl(reason: impl Into<String>) -> Self {
        Self::InvalidAcl {
            reason: reason.into(),
        }
    }

    /// Creates an invalid policy error.
    pub fn invalid_policy(reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            reason: reason.into(),
        }
    }
}

impl ErrorCode for EnforcerError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidAcl { .. } => "AUTH_INVALID_ACL",
            Self::InvalidPolicy { .. } => "AUTH_INVALID_POLICY",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
