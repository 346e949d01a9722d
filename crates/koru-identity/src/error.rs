//! Error types for the identity layer.
//!
//! Identity failures and profile failures are kept apart on purpose: the
//! session layer treats the first as fatal to a session and absorbs the
//! second with defaults.

/// Errors reported by an [`IdentityProvider`](crate::IdentityProvider).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// No identity is signed in, so there is no credential to issue.
    #[error("no identity is currently signed in")]
    NoCurrentUser,

    /// The email/password pair was not accepted.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The provider refused to renew the credential (revoked, expired
    /// refresh token, disabled account).
    #[error("credential rejected: {0}")]
    CredentialRejected(String),

    /// The provider could not be reached.
    #[error("identity provider unreachable: {0}")]
    Network(String),
}

/// Errors reported by a [`ProfileStore`](crate::ProfileStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    /// The store could not be reached or refused the request.
    #[error("profile store unavailable: {0}")]
    Unavailable(String),

    /// A document exists but could not be decoded into a [`Profile`](crate::Profile).
    #[error("malformed profile document: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_error_display_includes_reason() {
        let err = IdentityError::CredentialRejected("TOKEN_EXPIRED".into());
        assert_eq!(err.to_string(), "credential rejected: TOKEN_EXPIRED");
    }

    #[test]
    fn test_profile_error_display_includes_reason() {
        let err = ProfileError::Unavailable("deadline exceeded".into());
        assert!(err.to_string().contains("deadline exceeded"));
    }
}
