//! Identity records: who is signed in and what credential they hold.
//!
//! These mirror what an identity provider hands back after sign-in:
//! a stable id plus contact details ([`Identity`]), and a short-lived
//! bearer token with its signed claims ([`Credential`]).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// The provider-assigned identifier of a principal.
///
/// Opaque to us: we only compare, hash and print it. Serialized as the
/// bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a `UserId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The authenticated principal as the identity provider knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    /// Not every sign-in method yields an email (anonymous, phone).
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub display_name: Option<String>,
}

impl Identity {
    /// Creates an identity with only an id; remaining fields empty.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            email: None,
            email_verified: false,
            display_name: None,
        }
    }

    /// Builder-style email setter.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Builder-style display-name setter.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// The signed claim set carried by a credential.
///
/// Only the legacy single-role claim is modelled as a field; everything
/// else (custom claims, `auth_time`, ...) is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Legacy single-role claim. Newer accounts carry their roles on the
    /// profile document instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Claims carrying only the legacy role.
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            extra: Map::new(),
        }
    }

    /// The legacy role claim, if present and non-blank.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    /// Looks up any other claim by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A bearer token, its claims, and the instant it stops being valid.
///
/// `expires_at` is a monotonic [`tokio::time::Instant`] so that renewal
/// deadlines are immune to wall-clock jumps and follow a paused test clock.
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub token: String,
    pub claims: Claims,
    pub expires_at: Instant,
}

impl Credential {
    /// Creates a credential that expires `ttl` from now.
    pub fn expiring_in(token: impl Into<String>, claims: Claims, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            claims,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Converts a JWT-style `exp` (seconds since the Unix epoch) into a
    /// monotonic deadline. An `exp` in the past maps to "now".
    pub fn from_unix_expiry(token: impl Into<String>, claims: Claims, exp_secs: i64) -> Self {
        let remaining = exp_secs.saturating_sub(chrono::Utc::now().timestamp());
        let ttl = Duration::from_secs(remaining.max(0).unsigned_abs());
        Self::expiring_in(token, claims, ttl)
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    /// Whether the credential has expired at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Tokens are secrets; never print them.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("claims", &self.claims)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_display_is_raw_string() {
        assert_eq!(UserId::new("u-42").to_string(), "u-42");
    }

    #[test]
    fn test_user_id_serializes_transparently() {
        let json = serde_json::to_string(&UserId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_claims_role_ignores_blank_values() {
        assert_eq!(Claims::with_role("admin").role(), Some("admin"));
        assert_eq!(Claims::with_role("  ").role(), None);
        assert_eq!(Claims::default().role(), None);
    }

    #[test]
    fn test_claims_deserialize_keeps_unknown_claims() {
        let claims: Claims =
            serde_json::from_str(r#"{"role":"editor","auth_time":1700000000}"#).unwrap();
        assert_eq!(claims.role(), Some("editor"));
        assert_eq!(claims.get("auth_time"), Some(&Value::from(1_700_000_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_remaining_saturates_after_expiry() {
        let cred = Credential::expiring_in("t", Claims::default(), Duration::from_secs(60));
        let start = Instant::now();
        assert_eq!(cred.remaining(start), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(cred.remaining(Instant::now()), Duration::ZERO);
        assert!(cred.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_unix_expiry_past_exp_is_already_expired() {
        let cred = Credential::from_unix_expiry("t", Claims::default(), 0);
        assert!(cred.is_expired(Instant::now()));
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let cred = Credential::expiring_in("secret-token", Claims::default(), Duration::ZERO);
        let printed = format!("{cred:?}");
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("<redacted>"));
    }
}
