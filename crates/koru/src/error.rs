//! Unified error type for the Koru toolkit.

use koru_identity::{IdentityError, ProfileError};
use koru_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KoruError {
    /// The identity provider failed or rejected a request.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The profile store failed.
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// The session manager is gone, rejected a sign-in, or was misconfigured.
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_identity_error() {
        let err = IdentityError::Network("timeout".into());
        let koru_err: KoruError = err.into();
        assert!(matches!(koru_err, KoruError::Identity(_)));
        assert!(koru_err.to_string().contains("timeout"));
    }

    #[test]
    fn test_from_profile_error() {
        let err = ProfileError::Malformed("roles is not an array".into());
        let koru_err: KoruError = err.into();
        assert!(matches!(koru_err, KoruError::Profile(_)));
        assert!(koru_err.to_string().contains("roles"));
    }

    #[test]
    fn test_from_session_error() {
        let koru_err: KoruError = SessionError::Closed.into();
        assert!(matches!(koru_err, KoruError::Session(SessionError::Closed)));
    }

    #[test]
    fn test_question_mark_converts_sign_in_failure() {
        fn sign_in() -> Result<(), KoruError> {
            Err(SessionError::SignIn(IdentityError::InvalidCredentials))?;
            Ok(())
        }
        let err = sign_in().unwrap_err();
        assert_eq!(err.to_string(), "sign-in failed: invalid email or password");
    }
}
