//! In-memory collaborators.
//!
//! [`MemoryIdentityProvider`] and [`MemoryProfileStore`] behave like their
//! hosted counterparts closely enough to drive a session manager end to end:
//! identity changes are broadcast to subscribers, credentials carry real
//! expiry instants, and both sides can be told to fail.
//!
//! Each exposes call counters so tests can assert *how often* the session
//! layer reached out, not just what it ended up with.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;

use crate::{
    Claims, Credential, Identity, IdentityError, IdentityProvider, IdentitySubscription, Profile,
    ProfileError, ProfileStore, UserId,
};

/// Lifetime of issued tokens unless overridden. Matches hosted ID tokens.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

// ---------------------------------------------------------------------------
// MemoryIdentityProvider
// ---------------------------------------------------------------------------

struct Account {
    password: String,
    identity: Identity,
}

struct ProviderInner {
    current: Option<Identity>,
    /// Keyed by lower-cased email.
    accounts: HashMap<String, Account>,
    claims: HashMap<UserId, Claims>,
    subscribers: HashMap<u64, mpsc::UnboundedSender<Option<Identity>>>,
    next_subscriber: u64,
    token_ttl: Duration,
    latency: Duration,
    refresh_failure: Option<IdentityError>,
    sign_out_failure: Option<IdentityError>,
    refresh_calls: usize,
    sign_out_calls: usize,
}

impl ProviderInner {
    /// Pushes the current identity to every live subscriber, dropping the
    /// ones whose receiver is gone.
    fn broadcast(&mut self) {
        let current = self.current.clone();
        self.subscribers
            .retain(|_, tx| tx.send(current.clone()).is_ok());
    }
}

/// An identity provider that keeps accounts and the signed-in identity in
/// memory.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryIdentityProvider {
    inner: Arc<Mutex<ProviderInner>>,
}

impl MemoryIdentityProvider {
    /// Creates a provider with nobody signed in.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProviderInner {
                current: None,
                accounts: HashMap::new(),
                claims: HashMap::new(),
                subscribers: HashMap::new(),
                next_subscriber: 0,
                token_ttl: DEFAULT_TOKEN_TTL,
                latency: Duration::ZERO,
                refresh_failure: None,
                sign_out_failure: None,
                refresh_calls: 0,
                sign_out_calls: 0,
            })),
        }
    }

    /// Creates a provider that issues tokens valid for `ttl`.
    pub fn with_token_ttl(ttl: Duration) -> Self {
        let provider = Self::new();
        provider.set_token_ttl(ttl);
        provider
    }

    /// Registers an email/password account and returns its id.
    pub fn register(&self, email: &str, password: &str, display_name: &str) -> UserId {
        let id = UserId::new(format!("uid-{}", generate_token()));
        let identity = Identity::new(id.as_str())
            .with_email(email)
            .with_display_name(display_name);
        self.inner.lock().accounts.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                identity,
            },
        );
        id
    }

    /// Replaces the signed-in identity and notifies subscribers.
    ///
    /// This is how tests simulate sign-ins from another tab or a
    /// provider-side revocation.
    pub fn set_current(&self, identity: Option<Identity>) {
        let mut inner = self.inner.lock();
        inner.current = identity;
        inner.broadcast();
    }

    /// The identity currently signed in.
    pub fn current(&self) -> Option<Identity> {
        self.inner.lock().current.clone()
    }

    /// Sets the lifetime of tokens issued from now on.
    pub fn set_token_ttl(&self, ttl: Duration) {
        self.inner.lock().token_ttl = ttl;
    }

    /// Delays every credential and sign-out call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Sets the claims embedded in credentials issued to `id`.
    pub fn set_claims(&self, id: &UserId, claims: Claims) {
        self.inner.lock().claims.insert(id.clone(), claims);
    }

    /// Makes every credential request fail with `error` (or succeed again
    /// with `None`).
    pub fn fail_refresh(&self, error: Option<IdentityError>) {
        self.inner.lock().refresh_failure = error;
    }

    /// Makes every sign-out fail with `error` (or succeed again with `None`).
    pub fn fail_sign_out(&self, error: Option<IdentityError>) {
        self.inner.lock().sign_out_failure = error;
    }

    /// Number of credential requests received so far.
    pub fn refresh_calls(&self) -> usize {
        self.inner.lock().refresh_calls
    }

    /// Number of sign-out requests received so far.
    pub fn sign_out_calls(&self) -> usize {
        self.inner.lock().sign_out_calls
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    fn issue_credential(&self) -> Result<Credential, IdentityError> {
        let mut inner = self.inner.lock();
        inner.refresh_calls += 1;
        let identity = inner.current.clone().ok_or(IdentityError::NoCurrentUser)?;
        if let Some(err) = inner.refresh_failure.clone() {
            tracing::debug!(user_id = %identity.id, error = %err, "refusing credential");
            return Err(err);
        }
        let claims = inner.claims.get(&identity.id).cloned().unwrap_or_default();
        Ok(Credential::expiring_in(generate_token(), claims, inner.token_ttl))
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    fn subscribe(&self) -> IdentitySubscription {
        let mut inner = self.inner.lock();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;

        let registry: Weak<Mutex<ProviderInner>> = Arc::downgrade(&self.inner);
        let (tx, sub) = IdentitySubscription::channel(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().subscribers.remove(&id);
            }
        });

        // The current identity is always the first item.
        let _ = tx.send(inner.current.clone());
        inner.subscribers.insert(id, tx);
        sub
    }

    fn fresh_credential(
        &self,
        _force_refresh: bool,
    ) -> impl Future<Output = Result<Credential, IdentityError>> + Send {
        let latency = self.inner.lock().latency;
        let result = self.issue_credential();
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            result
        }
    }

    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, IdentityError>> + Send {
        let mut inner = self.inner.lock();
        let result = match inner.accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => {
                let identity = account.identity.clone();
                inner.current = Some(identity.clone());
                inner.broadcast();
                tracing::info!(user_id = %identity.id, "signed in");
                Ok(identity)
            }
            _ => Err(IdentityError::InvalidCredentials),
        };
        drop(inner);
        async move { result }
    }

    fn sign_out(&self) -> impl Future<Output = Result<(), IdentityError>> + Send {
        let mut inner = self.inner.lock();
        inner.sign_out_calls += 1;
        let latency = inner.latency;
        let result = match inner.sign_out_failure.clone() {
            Some(err) => Err(err),
            None => {
                inner.current = None;
                inner.broadcast();
                Ok(())
            }
        };
        drop(inner);
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            result
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryProfileStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreInner {
    profiles: HashMap<UserId, Profile>,
    failure: Option<ProfileError>,
    logins: Vec<(UserId, DateTime<Utc>)>,
}

/// A profile store backed by a `HashMap`.
///
/// Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryProfileStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the profile for `id`.
    pub fn insert(&self, id: UserId, profile: Profile) {
        self.inner.lock().profiles.insert(id, profile);
    }

    /// Reads a stored profile without going through the trait.
    pub fn profile(&self, id: &UserId) -> Option<Profile> {
        self.inner.lock().profiles.get(id).cloned()
    }

    /// Makes every call fail with `error` (or succeed again with `None`).
    pub fn fail_with(&self, error: Option<ProfileError>) {
        self.inner.lock().failure = error;
    }

    /// Every `record_login` call received, in order.
    pub fn logins(&self) -> Vec<(UserId, DateTime<Utc>)> {
        self.inner.lock().logins.clone()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Option<Profile>, ProfileError>> + Send {
        let inner = self.inner.lock();
        let result = match &inner.failure {
            Some(err) => Err(err.clone()),
            None => Ok(inner.profiles.get(id).cloned()),
        };
        drop(inner);
        async move { result }
    }

    fn record_login(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), ProfileError>> + Send {
        let mut inner = self.inner.lock();
        let result = match &inner.failure {
            Some(err) => Err(err.clone()),
            None => {
                inner.logins.push((id.clone(), at));
                if let Some(profile) = inner.profiles.get_mut(id) {
                    profile.last_login_at = Some(at);
                }
                Ok(())
            }
        };
        drop(inner);
        async move { result }
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
