//! The observable session state.
//!
//! [`SessionState`] is what the UI renders from. It is rebuilt by the
//! session actor on every transition and published over a `watch` channel,
//! so readers always see a complete, consistent snapshot.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use koru_identity::{Credential, Identity, Profile, UserId, default_roles};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
///
/// ```text
///   Uninitialized ──→ Loading ──→ Authenticated ⇄ WarningPending
///                        │              │               │
///                        └──────────────┴───────────────┴──→ Anonymous
/// ```
///
/// `Uninitialized` and `Loading` are transient. `Loading` is re-entered
/// each time the provider reports a new identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Authenticated,
    WarningPending,
    Anonymous,
}

impl SessionPhase {
    /// Whether a user is (or is being) signed in.
    pub fn has_session(&self) -> bool {
        matches!(self, Self::Loading | Self::Authenticated | Self::WarningPending)
    }
}

// ---------------------------------------------------------------------------
// SessionUser
// ---------------------------------------------------------------------------

/// The signed-in user: identity, credential and profile merged into one
/// record.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub id: UserId,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub credential: Credential,
    pub first_name: String,
    pub last_name: String,
    /// `first last`, falling back to the display name, then the email.
    pub full_name: String,
    /// Never empty.
    pub roles: BTreeSet<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl SessionUser {
    /// Merges an identity, its credential and (optionally) its profile.
    ///
    /// Roles come from the profile; a profile without roles falls back to
    /// the credential's legacy role claim, then to `{"user"}`. A missing
    /// profile yields empty names and `{"user"}`.
    pub fn assemble(identity: Identity, credential: Credential, profile: Option<&Profile>) -> Self {
        let roles = profile.map_or_else(default_roles, |p| p.effective_roles(&credential.claims));
        let first_name = profile
            .and_then(|p| p.first_name.clone())
            .unwrap_or_default();
        let last_name = profile
            .and_then(|p| p.last_name.clone())
            .unwrap_or_default();
        let full_name = derive_full_name(&first_name, &last_name, &identity);

        Self {
            id: identity.id,
            email: identity.email,
            email_verified: identity.email_verified,
            display_name: identity.display_name,
            credential,
            first_name,
            last_name,
            full_name,
            roles,
            created_at: profile.and_then(|p| p.created_at),
            last_login_at: profile.and_then(|p| p.last_login_at),
        }
    }

    /// The bearer token to attach to API calls.
    pub fn token(&self) -> &str {
        &self.credential.token
    }

    /// When the current credential expires.
    pub fn expires_at(&self) -> Instant {
        self.credential.expires_at
    }

    /// Whether the user holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Shorthand for `has_role("admin")`.
    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

fn derive_full_name(first: &str, last: &str, identity: &Identity) -> String {
    let joined = format!("{} {}", first.trim(), last.trim());
    let joined = joined.trim();
    if !joined.is_empty() {
        return joined.to_string();
    }
    identity
        .display_name
        .clone()
        .or_else(|| identity.email.clone())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// `{user, loading}` plus the lifecycle phase.
///
/// `user` is `Some` exactly while a credential obtained for the current
/// identity is held; `loading` is `true` only between mount or an identity
/// change and the first resolution of that identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<SessionUser>,
    pub loading: bool,
    pub phase: SessionPhase,
}

impl SessionState {
    /// Whether a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Roles of the signed-in user; empty when signed out.
    pub fn roles(&self) -> BTreeSet<String> {
        self.user
            .as_ref()
            .map(|u| u.roles.clone())
            .unwrap_or_default()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
            phase: SessionPhase::Uninitialized,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use koru_identity::{Claims, DEFAULT_ROLE};

    use super::*;

    fn identity() -> Identity {
        Identity::new("u1")
            .with_email("ada@example.com")
            .with_display_name("Ada L")
    }

    fn credential(claims: Claims) -> Credential {
        Credential::expiring_in("tok", claims, Duration::from_secs(3600))
    }

    #[test]
    fn test_assemble_without_profile_defaults_roles_and_names() {
        let user = SessionUser::assemble(identity(), credential(Claims::default()), None);

        assert_eq!(user.roles, BTreeSet::from([DEFAULT_ROLE.to_string()]));
        assert_eq!(user.first_name, "");
        assert_eq!(user.last_name, "");
        assert_eq!(user.full_name, "Ada L");
    }

    #[test]
    fn test_assemble_without_profile_ignores_legacy_claim() {
        let user = SessionUser::assemble(identity(), credential(Claims::with_role("admin")), None);

        assert!(!user.is_admin());
        assert!(user.has_role(DEFAULT_ROLE));
    }

    #[test]
    fn test_assemble_merges_profile_fields() {
        let profile = Profile::named("Ada", "Lovelace").with_role("admin");

        let user = SessionUser::assemble(identity(), credential(Claims::default()), Some(&profile));

        assert_eq!(user.full_name, "Ada Lovelace");
        assert!(user.is_admin());
        assert!(!user.has_role(DEFAULT_ROLE));
    }

    #[test]
    fn test_assemble_profile_without_roles_uses_legacy_claim() {
        let profile = Profile::named("Ada", "Lovelace");

        let user = SessionUser::assemble(
            identity(),
            credential(Claims::with_role("editor")),
            Some(&profile),
        );

        assert_eq!(user.roles, BTreeSet::from(["editor".to_string()]));
    }

    #[test]
    fn test_full_name_falls_back_to_email() {
        let id = Identity::new("u2").with_email("grace@example.com");

        let user = SessionUser::assemble(id, credential(Claims::default()), None);

        assert_eq!(user.full_name, "grace@example.com");
    }

    #[test]
    fn test_full_name_with_only_first_name() {
        let profile = Profile {
            first_name: Some("Grace".into()),
            ..Profile::default()
        };

        let user = SessionUser::assemble(identity(), credential(Claims::default()), Some(&profile));

        assert_eq!(user.full_name, "Grace");
    }

    #[test]
    fn test_default_state_is_loading_and_empty() {
        let state = SessionState::default();
        assert!(state.loading);
        assert!(!state.is_authenticated());
        assert!(state.roles().is_empty());
        assert_eq!(state.phase, SessionPhase::Uninitialized);
    }

    #[test]
    fn test_phase_has_session() {
        assert!(SessionPhase::Loading.has_session());
        assert!(SessionPhase::Authenticated.has_session());
        assert!(SessionPhase::WarningPending.has_session());
        assert!(!SessionPhase::Anonymous.has_session());
        assert!(!SessionPhase::Uninitialized.has_session());
    }
}
