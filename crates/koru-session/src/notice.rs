//! What the session manager tells the UI, and what the UI tells it back.

use std::time::Duration;

use tokio::sync::mpsc;

/// A one-off, user-visible event.
///
/// Each notice is delivered once; the manager deduplicates "signed out"
/// and "session expired" so racing code paths never show them twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The user was signed out on request.
    SignedOut,

    /// The credential could not be renewed and the session ended.
    /// `return_to` is the route to restore after the next sign-in.
    SessionExpired { return_to: Option<String> },

    /// The credential is about to expire. The UI should ask the user to
    /// stay signed in or log out, and answer with
    /// [`SessionManager::resolve_warning`](crate::SessionManager::resolve_warning).
    ExpiryWarning { expires_in: Duration },

    /// The provider's sign-out call failed. Local state was cleared anyway.
    SignOutFailed { reason: String },

    /// The UI should navigate to `route`.
    Navigate { route: String },
}

/// Receiving end of the notice stream, handed out by
/// [`SessionManager::start`](crate::SessionManager::start).
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

/// The user's answer to an [`Notice::ExpiryWarning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningChoice {
    StaySignedIn,
    LogOut,
}

/// Page visibility, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}
