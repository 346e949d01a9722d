//! Error types for the session layer.

use koru_identity::IdentityError;

/// Errors returned by [`SessionManager`](crate::SessionManager) calls.
///
/// Session-ending failures (renewal, expiry) are not errors here; they
/// are reported to the UI as [`Notice`](crate::Notice)s.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session actor has stopped; the manager was shut down.
    #[error("session manager is no longer running")]
    Closed,

    /// The identity provider rejected a sign-in.
    #[error("sign-in failed: {0}")]
    SignIn(#[from] IdentityError),

    /// A configuration document could not be parsed.
    #[error("invalid session config: {0}")]
    Config(#[from] serde_json::Error),
}
