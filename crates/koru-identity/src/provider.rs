//! The identity-provider hook.
//!
//! Koru doesn't implement sign-in itself; that's the provider's job
//! (Firebase Authentication in production). The [`IdentityProvider`] trait
//! captures the four things the session layer needs from it: a stream of
//! identity changes, credential issuance, sign-in and sign-out.

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;

use crate::{Credential, Identity, IdentityError};

/// Supplies identities and credentials to the session layer.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one provider is shared (behind an `Arc`)
///   by the session actor and every task it spawns.
/// - The returned futures are `Send` so they can be driven by
///   `tokio::spawn`.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Registers for identity changes.
    ///
    /// The first item yielded is the identity current at subscription time
    /// (`None` when signed out); every later item is a change. Dropping the
    /// returned handle unregisters it.
    fn subscribe(&self) -> IdentitySubscription;

    /// Issues a credential for the current identity.
    ///
    /// With `force_refresh` the provider must mint a new token rather than
    /// return a cached one.
    fn fresh_credential(
        &self,
        force_refresh: bool,
    ) -> impl Future<Output = Result<Credential, IdentityError>> + Send;

    /// Signs in with email and password. On success subscribers observe the
    /// new identity.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, IdentityError>> + Send;

    /// Signs the current identity out. On success subscribers observe `None`.
    fn sign_out(&self) -> impl Future<Output = Result<(), IdentityError>> + Send;
}

/// An owned registration on an identity provider's change stream.
///
/// Acquired from [`IdentityProvider::subscribe`]; the unregister callback
/// runs exactly once, when this handle is dropped.
pub struct IdentitySubscription {
    receiver: mpsc::UnboundedReceiver<Option<Identity>>,
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl IdentitySubscription {
    /// Creates a subscription and the sender the provider pushes changes into.
    pub fn channel(
        unregister: impl FnOnce() + Send + 'static,
    ) -> (mpsc::UnboundedSender<Option<Identity>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = Self {
            receiver: rx,
            unregister: Some(Box::new(unregister)),
        };
        (tx, sub)
    }

    /// Waits for the next identity change.
    ///
    /// Returns `None` once the provider side has gone away; `Some(None)`
    /// means "signed out".
    pub async fn changed(&mut self) -> Option<Option<Identity>> {
        self.receiver.recv().await
    }
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl fmt::Debug for IdentitySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySubscription")
            .field("registered", &self.unregister.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_drop_runs_unregister_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (_tx, sub) = IdentitySubscription::channel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        drop(sub);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_changed_yields_pushed_identities_in_order() {
        let (tx, mut sub) = IdentitySubscription::channel(|| {});
        tx.send(Some(Identity::new("a"))).unwrap();
        tx.send(None).unwrap();

        assert_eq!(sub.changed().await, Some(Some(Identity::new("a"))));
        assert_eq!(sub.changed().await, Some(None));
    }

    #[tokio::test]
    async fn test_changed_returns_none_when_provider_gone() {
        let (tx, mut sub) = IdentitySubscription::channel(|| {});
        drop(tx);

        assert_eq!(sub.changed().await, None);
    }
}
