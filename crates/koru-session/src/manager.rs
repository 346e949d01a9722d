//! The session manager handle: what the UI holds.
//!
//! [`SessionManager::start`] spawns the session actor and returns a handle
//! plus the notice stream. The handle is how the UI reads state, reports
//! activity and visibility, and asks for sign-out or renewal.
//!
//! Dropping the handle aborts the actor, which releases the identity
//! subscription and both timers. Use [`SessionManager::shutdown`] to wait
//! for that to finish.

use std::sync::Arc;

use futures_util::{Stream, StreamExt, stream};
use koru_identity::{Identity, IdentityProvider, ProfileStore};
use koru_renewal::{ActivityTracker, Interaction, WarningPlan};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::actor::{Command, SessionActor};
use crate::{NoticeReceiver, SessionConfig, SessionError};
use crate::{SessionState, Visibility, WarningChoice};

/// The timers a session currently has armed.
///
/// There is never more than one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingTimers {
    pub renewal_at: Option<Instant>,
    pub warning: Option<WarningPlan>,
}

impl PendingTimers {
    /// Number of armed timers (0–2).
    pub fn count(&self) -> usize {
        usize::from(self.renewal_at.is_some()) + usize::from(self.warning.is_some())
    }
}

/// Handle to a running session actor.
///
/// ## Lifecycle
///
/// ```text
/// start() ──→ [Loading] ──identity──→ [Authenticated] ──warning──→ [WarningPending]
///                 │                        │    ↑                        │
///                 │                        │    └──────stay signed in────┤
///                 ▼                        ▼                             ▼
///            [Anonymous] ←──────── sign_out() / renewal failure ─────────┘
/// ```
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    activity: ActivityTracker,
    task: Option<JoinHandle<()>>,
}

impl SessionManager {
    /// Spawns a session actor observing `provider` and reading profiles
    /// from `store`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<P, S>(
        provider: Arc<P>,
        store: Arc<S>,
        config: SessionConfig,
    ) -> (Self, NoticeReceiver)
    where
        P: IdentityProvider,
        S: ProfileStore,
    {
        let config = config.validated();
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let activity = ActivityTracker::new();

        let actor = SessionActor::new(
            provider,
            store,
            config.policy,
            config.root_route,
            cmd_rx,
            state_tx,
            notice_tx,
            activity.clone(),
        );
        let task = tokio::spawn(actor.run());

        let manager = Self {
            commands: cmd_tx,
            state: state_rx,
            activity,
            task: Some(task),
        };
        (manager, notice_rx)
    }

    // -- Reading state ----------------------------------------------------

    /// A receiver that sees every published [`SessionState`].
    pub fn observe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// The current state, followed by every later transition.
    pub fn updates(&self) -> impl Stream<Item = SessionState> + Send + 'static {
        let mut rx = self.state.clone();
        let first = rx.borrow_and_update().clone();
        stream::once(async move { first }).chain(stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let next = rx.borrow_and_update().clone();
            Some((next, rx))
        }))
    }

    /// A snapshot of the current state.
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    // -- Activity ---------------------------------------------------------

    /// The shared activity tracker. Hand clones to input handlers.
    pub fn activity(&self) -> ActivityTracker {
        self.activity.clone()
    }

    /// Records a user interaction. A single atomic store.
    pub fn record_activity(&self, interaction: Interaction) {
        self.activity.record(interaction);
    }

    // -- Commands ---------------------------------------------------------

    /// Signs in through the identity provider.
    ///
    /// The session itself is established when the provider reports the new
    /// identity, exactly as for any other identity change.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::SignIn {
            email: email.to_string(),
            password: password.to_string(),
            reply: reply_tx,
        })
        .await?;
        let result = reply_rx.await.map_err(|_| SessionError::Closed)?;
        Ok(result?)
    }

    /// Signs out. Cancels both timers, clears the session and navigates to
    /// the root route; with `notify`, shows "signed out" once.
    ///
    /// Safe to call repeatedly and from racing code paths.
    pub async fn sign_out(&self, notify: bool) -> Result<(), SessionError> {
        self.send(Command::SignOut { notify }).await
    }

    /// Renews the credential now. No-op without a session.
    pub async fn refresh_token(&self) -> Result<(), SessionError> {
        self.send(Command::RefreshToken).await
    }

    /// Answers a pending [`Notice::ExpiryWarning`](crate::Notice::ExpiryWarning).
    pub async fn resolve_warning(&self, choice: WarningChoice) -> Result<(), SessionError> {
        self.send(Command::ResolveWarning(choice)).await
    }

    /// Reports a page-visibility change.
    pub async fn visibility_changed(&self, visibility: Visibility) -> Result<(), SessionError> {
        self.send(Command::Visibility(visibility)).await
    }

    /// Tells the manager which route the user is on, so it can be restored
    /// after an expired session.
    pub async fn set_route(&self, route: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::SetRoute(route.into())).await
    }

    /// Takes the route saved when the last session expired.
    pub async fn take_return_route(&self) -> Result<Option<String>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::TakeReturnRoute { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }

    /// The timers the session currently has armed.
    pub async fn pending_timers(&self) -> Result<PendingTimers, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::PendingTimers { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stops the actor and waits for it to release its subscription and
    /// timers.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    async fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
