//! The application's own record about a principal, and where it lives.
//!
//! The identity provider knows *who* someone is; the profile store knows
//! what the application thinks of them (name, roles). The two are fetched
//! separately and merged by the session layer.

use std::collections::BTreeSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Claims, ProfileError, UserId};

/// Role granted to every principal whose profile names none.
pub const DEFAULT_ROLE: &str = "user";

/// A profile document, keyed by [`UserId`] in the [`ProfileStore`].
///
/// Every field is optional in storage; documents written by older
/// versions of the app may lack roles or timestamps entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// A profile with just a name.
    pub fn named(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            ..Self::default()
        }
    }

    /// Builder-style role adder.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// The roles this principal holds.
    ///
    /// Stored roles win. A profile without roles falls back to the
    /// credential's legacy single-role claim, then to `{"user"}`. Never
    /// returns an empty set.
    pub fn effective_roles(&self, claims: &Claims) -> BTreeSet<String> {
        if !self.roles.is_empty() {
            return self.roles.clone();
        }
        match claims.role() {
            Some(role) => BTreeSet::from([role.to_string()]),
            None => default_roles(),
        }
    }
}

/// The role set applied when no profile says otherwise.
pub fn default_roles() -> BTreeSet<String> {
    BTreeSet::from([DEFAULT_ROLE.to_string()])
}

/// A document store holding one [`Profile`] per principal.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` and `Send` futures: the session manager shares
/// the store behind an `Arc` and calls it from spawned tasks.
pub trait ProfileStore: Send + Sync + 'static {
    /// Looks up the profile for `id`. `Ok(None)` means no document exists,
    /// which is not an error.
    fn get(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Option<Profile>, ProfileError>> + Send;

    /// Stamps the last-login instant on the profile.
    ///
    /// Default: does nothing. Stores that can write override this.
    fn record_login(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), ProfileError>> + Send {
        let _ = (id, at);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_roles_defaults_to_user() {
        let profile = Profile::named("Ada", "Lovelace");
        assert_eq!(profile.effective_roles(&Claims::default()), default_roles());
    }

    #[test]
    fn test_effective_roles_empty_profile_uses_legacy_claim() {
        let profile = Profile::named("Ada", "Lovelace");
        let roles = profile.effective_roles(&Claims::with_role("editor"));
        assert_eq!(roles, BTreeSet::from(["editor".to_string()]));
    }

    #[test]
    fn test_effective_roles_keeps_stored_roles() {
        let profile = Profile::default().with_role("admin").with_role("editor");
        let roles = profile.effective_roles(&Claims::with_role("moderator"));
        assert!(roles.contains("admin"));
        assert!(roles.contains("editor"));
        assert!(!roles.contains(DEFAULT_ROLE));
        assert!(!roles.contains("moderator"));
    }

    #[test]
    fn test_profile_deserializes_sparse_document() {
        let profile: Profile = serde_json::from_str(r#"{"firstName":"Ada"}"#).unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert!(profile.last_name.is_none());
        assert!(profile.roles.is_empty());
    }

    #[test]
    fn test_profile_deserializes_timestamps() {
        let profile: Profile = serde_json::from_str(
            r#"{"roles":["admin"],"createdAt":"2024-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(
            profile.created_at.map(|t| t.to_rfc3339()),
            Some("2024-01-02T03:04:05+00:00".to_string())
        );
        assert!(profile.roles.contains("admin"));
    }
}
