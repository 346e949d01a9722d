//! Session actor: one Tokio task that owns the whole session lifecycle.
//!
//! Commands from the UI, identity changes from the provider, results of
//! spawned network calls, and the two timers are all multiplexed in a
//! single `select!` loop, so the session is never mutated from two places
//! at once.
//!
//! # Freshness
//!
//! Every identity change and every sign-out that ends a session starts a
//! new *epoch*. Network calls run in spawned tasks and report back tagged
//! with the epoch they were started in; results from an older epoch are
//! dropped on arrival.

use std::sync::Arc;

use chrono::Utc;
use koru_identity::{
    Credential, Identity, IdentityError, IdentityProvider, IdentitySubscription, Profile,
    ProfileError, ProfileStore,
};
use koru_renewal::{ActivityTracker, RenewalPlan, RenewalPolicy, TimerVerdict, WarningPlan};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::manager::PendingTimers;
use crate::{Notice, SessionPhase, SessionState, SessionUser, Visibility, WarningChoice};

/// Commands sent to the session actor through its channel.
///
/// Variants carrying a `oneshot::Sender` expect a reply.
pub(crate) enum Command {
    SignIn {
        email: String,
        password: String,
        reply: oneshot::Sender<Result<Identity, IdentityError>>,
    },
    SignOut {
        notify: bool,
    },
    RefreshToken,
    ResolveWarning(WarningChoice),
    Visibility(Visibility),
    SetRoute(String),
    TakeReturnRoute {
        reply: oneshot::Sender<Option<String>>,
    },
    PendingTimers {
        reply: oneshot::Sender<PendingTimers>,
    },
    Shutdown,
}

/// Results reported back by spawned tasks.
enum Outcome {
    Established {
        epoch: u64,
        identity: Identity,
        credential: Result<Credential, IdentityError>,
        profile: Result<Option<Profile>, ProfileError>,
    },
    Renewed {
        epoch: u64,
        result: Result<Credential, IdentityError>,
    },
    SignOutFinished {
        epoch: u64,
        result: Result<(), IdentityError>,
    },
}

/// The internal actor state. Runs inside a Tokio task.
pub(crate) struct SessionActor<P: IdentityProvider, S: ProfileStore> {
    provider: Arc<P>,
    store: Arc<S>,
    policy: RenewalPolicy,
    root_route: String,

    subscription: Option<IdentitySubscription>,
    commands: mpsc::Receiver<Command>,
    outcomes_tx: mpsc::UnboundedSender<Outcome>,
    outcomes_rx: mpsc::UnboundedReceiver<Outcome>,
    state: watch::Sender<SessionState>,
    notices: mpsc::UnboundedSender<Notice>,
    activity: ActivityTracker,

    epoch: u64,
    /// The identity being established or currently signed in.
    identity: Option<Identity>,
    /// The one pending renewal timer.
    renewal_at: Option<Instant>,
    /// The one pending warning (or hard-expiry) timer.
    warning: Option<WarningPlan>,
    renewal_in_flight: bool,
    /// Epoch of the provider sign-out still running, if any.
    sign_out_in_flight: Option<u64>,

    current_route: Option<String>,
    return_route: Option<String>,
    /// Latched when "session expired" is shown; reset only by a new actor.
    expired_notified: bool,
}

impl<P: IdentityProvider, S: ProfileStore> SessionActor<P, S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        provider: Arc<P>,
        store: Arc<S>,
        policy: RenewalPolicy,
        root_route: String,
        commands: mpsc::Receiver<Command>,
        state: watch::Sender<SessionState>,
        notices: mpsc::UnboundedSender<Notice>,
        activity: ActivityTracker,
    ) -> Self {
        let subscription = provider.subscribe();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            store,
            policy,
            root_route,
            subscription: Some(subscription),
            commands,
            outcomes_tx,
            outcomes_rx,
            state,
            notices,
            activity,
            epoch: 0,
            identity: None,
            renewal_at: None,
            warning: None,
            renewal_in_flight: false,
            sign_out_in_flight: None,
            current_route: None,
            return_route: None,
            expired_notified: false,
        }
    }

    /// Runs the actor loop until shutdown.
    pub(crate) async fn run(mut self) {
        info!("session manager started");
        self.publish(|s| {
            s.phase = SessionPhase::Loading;
            s.loading = true;
        });

        loop {
            tokio::select! {
                biased;

                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                change = next_change(&mut self.subscription) => match change {
                    Some(identity) => self.handle_identity_change(identity),
                    None => {
                        warn!("identity provider closed its change stream");
                        self.subscription = None;
                    }
                },
                Some(outcome) = self.outcomes_rx.recv() => self.handle_outcome(outcome),
                () = sleep_until(self.renewal_at) => self.on_renewal_timer(),
                () = sleep_until(self.warning.map(|w| w.deadline())) => self.on_warning_timer(),
            }
        }

        self.cancel_timers();
        self.subscription = None;
        info!("session manager stopped");
    }

    // -- Commands ---------------------------------------------------------

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SignIn {
                email,
                password,
                reply,
            } => {
                let provider = Arc::clone(&self.provider);
                tokio::spawn(async move {
                    let result = provider.sign_in_with_password(&email, &password).await;
                    let _ = reply.send(result);
                });
            }
            Command::SignOut { notify } => self.sign_out(notify),
            Command::RefreshToken => {
                if self.current_expiry().is_some() {
                    self.start_renewal("requested");
                } else {
                    debug!("refresh requested without a session, ignoring");
                }
            }
            Command::ResolveWarning(choice) => self.resolve_warning(choice),
            Command::Visibility(visibility) => self.handle_visibility(visibility),
            Command::SetRoute(route) => self.current_route = Some(route),
            Command::TakeReturnRoute { reply } => {
                let _ = reply.send(self.return_route.take());
            }
            Command::PendingTimers { reply } => {
                let _ = reply.send(PendingTimers {
                    renewal_at: self.renewal_at,
                    warning: self.warning,
                });
            }
            // Handled by the loop.
            Command::Shutdown => {}
        }
    }

    fn resolve_warning(&mut self, choice: WarningChoice) {
        if self.phase() != SessionPhase::WarningPending {
            debug!(?choice, "no expiry warning pending, ignoring");
            return;
        }
        match choice {
            WarningChoice::StaySignedIn => {
                self.activity.touch();
                self.start_renewal("user chose to stay signed in");
            }
            WarningChoice::LogOut => self.sign_out(false),
        }
    }

    fn handle_visibility(&mut self, visibility: Visibility) {
        if visibility == Visibility::Hidden {
            return;
        }
        let Some(expires_at) = self.current_expiry() else {
            return;
        };
        if self
            .policy
            .needs_visibility_renewal(expires_at, Instant::now())
        {
            self.start_renewal("page visible close to expiry");
        }
    }

    // -- Identity changes -------------------------------------------------

    fn handle_identity_change(&mut self, identity: Option<Identity>) {
        match identity {
            Some(identity) => self.establish(identity),
            None => {
                if self.identity.is_none() && self.phase() == SessionPhase::Anonymous {
                    return;
                }
                info!(epoch = self.epoch, "identity provider reports signed out");
                self.begin_epoch();
                self.identity = None;
                self.publish_anonymous();
            }
        }
    }

    /// Starts a new session cycle for `identity`: fresh credential, then
    /// profile, reported back as [`Outcome::Established`].
    fn establish(&mut self, identity: Identity) {
        self.begin_epoch();
        let epoch = self.epoch;
        info!(user_id = %identity.id, epoch, "identity changed, establishing session");

        self.identity = Some(identity.clone());
        self.publish(|s| {
            s.user = None;
            s.loading = true;
            s.phase = SessionPhase::Loading;
        });

        let provider = Arc::clone(&self.provider);
        let store = Arc::clone(&self.store);
        let outcomes = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let credential = provider.fresh_credential(true).await;
            let profile = match credential {
                Ok(_) => store.get(&identity.id).await,
                Err(_) => Ok(None),
            };
            let _ = outcomes.send(Outcome::Established {
                epoch,
                identity,
                credential,
                profile,
            });
        });
    }

    // -- Outcomes ---------------------------------------------------------

    fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Established {
                epoch,
                identity,
                credential,
                profile,
            } => {
                if epoch != self.epoch {
                    debug!(epoch, current = self.epoch, "dropping stale session cycle");
                    return;
                }
                match credential {
                    Ok(credential) => self.on_established(identity, credential, profile),
                    Err(err) => {
                        warn!(
                            user_id = %identity.id,
                            error = %err,
                            "could not obtain a credential"
                        );
                        self.end_expired_session(&err.to_string());
                    }
                }
            }
            Outcome::Renewed { epoch, result } => {
                if epoch != self.epoch {
                    debug!(epoch, current = self.epoch, "dropping stale renewal");
                    return;
                }
                self.renewal_in_flight = false;
                match result {
                    Ok(credential) => self.on_renewed(credential),
                    Err(err) => {
                        warn!(error = %err, "credential renewal failed");
                        self.end_expired_session(&err.to_string());
                    }
                }
            }
            Outcome::SignOutFinished { epoch, result } => {
                if self.sign_out_in_flight == Some(epoch) {
                    self.sign_out_in_flight = None;
                }
                if epoch != self.epoch {
                    debug!(epoch, current = self.epoch, "dropping stale sign-out result");
                    return;
                }
                match result {
                    Ok(()) => debug!("provider sign-out completed"),
                    Err(err) => {
                        warn!(
                            error = %err,
                            "provider sign-out failed, local session already cleared"
                        );
                        self.notify(Notice::SignOutFailed {
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn on_established(
        &mut self,
        identity: Identity,
        credential: Credential,
        profile: Result<Option<Profile>, ProfileError>,
    ) {
        let profile = profile.unwrap_or_else(|err| {
            warn!(user_id = %identity.id, error = %err, "profile fetch failed, using defaults");
            None
        });
        if profile.is_none() {
            debug!(user_id = %identity.id, "no profile document, using defaults");
        }

        let user_id = identity.id.clone();
        let expires_at = credential.expires_at;
        let user = SessionUser::assemble(identity, credential, profile.as_ref());
        info!(
            %user_id,
            epoch = self.epoch,
            roles = ?user.roles,
            "session established"
        );

        self.publish(|s| {
            s.user = Some(user);
            s.loading = false;
            s.phase = SessionPhase::Authenticated;
        });
        self.schedule(expires_at, true);

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(err) = store.record_login(&user_id, Utc::now()).await {
                warn!(%user_id, error = %err, "could not record last login");
            }
        });
    }

    fn on_renewed(&mut self, credential: Credential) {
        let expires_at = credential.expires_at;
        info!(
            epoch = self.epoch,
            valid_for_s = credential.remaining(Instant::now()).as_secs(),
            "credential renewed"
        );
        self.publish(|s| {
            if let Some(user) = s.user.as_mut() {
                user.credential = credential;
            }
            s.phase = SessionPhase::Authenticated;
        });
        self.schedule(expires_at, false);
    }

    // -- Scheduling -------------------------------------------------------

    /// Replaces both timers with the plan for a credential expiring at
    /// `expires_at`.
    ///
    /// `allow_immediate` is false right after a renewal: a freshly renewed
    /// credential that is already inside the immediate window is not
    /// renewed again.
    fn schedule(&mut self, expires_at: Instant, allow_immediate: bool) {
        let now = Instant::now();
        let plan = self.policy.plan(expires_at, now);
        self.cancel_timers();

        match plan.renewal {
            RenewalPlan::Immediate if allow_immediate => {
                self.start_renewal("expiry within the immediate window");
            }
            RenewalPlan::Immediate => {
                warn!(
                    valid_for_s = expires_at.saturating_duration_since(now).as_secs(),
                    "renewed credential is already due for renewal, not renewing again"
                );
            }
            RenewalPlan::At(at) => {
                debug!(delay_ms = plan.renewal_delay(now).as_millis() as u64, "renewal scheduled");
                self.renewal_at = Some(at);
            }
        }

        debug!(
            delay_ms = plan.warning_delay(now).as_millis() as u64,
            warning = matches!(plan.warning, WarningPlan::Warn(_)),
            "expiry timer scheduled"
        );
        self.warning = Some(plan.warning);
    }

    fn start_renewal(&mut self, reason: &'static str) {
        if self.renewal_in_flight {
            debug!(reason, "renewal already in flight, coalescing");
            return;
        }
        self.renewal_in_flight = true;
        info!(reason, epoch = self.epoch, "renewing credential");

        let epoch = self.epoch;
        let provider = Arc::clone(&self.provider);
        let outcomes = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let result = provider.fresh_credential(true).await;
            let _ = outcomes.send(Outcome::Renewed { epoch, result });
        });
    }

    fn on_renewal_timer(&mut self) {
        self.renewal_at = None;
        let now = Instant::now();
        match self
            .policy
            .on_renewal_timer(self.activity.last_activity(), now)
        {
            TimerVerdict::Act => self.start_renewal("refresh lead reached"),
            TimerVerdict::Skip => debug!(
                idle_s = self.activity.idle_for(now).as_secs(),
                "user inactive, skipping renewal"
            ),
        }
    }

    fn on_warning_timer(&mut self) {
        let Some(plan) = self.warning.take() else {
            return;
        };
        let Some(expires_at) = self.current_expiry() else {
            return;
        };
        let now = Instant::now();

        match plan {
            WarningPlan::Warn(_) => {
                self.warning = Some(WarningPlan::ExpireAt(expires_at));
                match self
                    .policy
                    .on_warning_timer(self.activity.last_activity(), now)
                {
                    TimerVerdict::Act => {
                        let expires_in = expires_at.saturating_duration_since(now);
                        info!(expires_in_s = expires_in.as_secs(), "warning user of expiry");
                        self.publish(|s| s.phase = SessionPhase::WarningPending);
                        self.notify(Notice::ExpiryWarning { expires_in });
                    }
                    TimerVerdict::Skip => debug!(
                        idle_s = self.activity.idle_for(now).as_secs(),
                        "user inactive, not warning"
                    ),
                }
            }
            WarningPlan::ExpireAt(_) => {
                if self.renewal_in_flight {
                    debug!("credential expired with renewal in flight, awaiting result");
                    return;
                }
                self.end_expired_session("credential expired");
            }
        }
    }

    fn cancel_timers(&mut self) {
        self.renewal_at = None;
        self.warning = None;
    }

    // -- Ending a session -------------------------------------------------

    /// Ends the session because its credential is gone: one-time
    /// "session expired" notice, remember where the user was, sign out
    /// without the generic notice.
    fn end_expired_session(&mut self, reason: &str) {
        warn!(reason, epoch = self.epoch, "session expired");
        if !self.expired_notified {
            self.expired_notified = true;
            self.notify(Notice::SessionExpired {
                return_to: self.current_route.clone(),
            });
        }
        self.return_route = self.current_route.clone();
        self.sign_out(false);
    }

    /// Ends the current session, if any, and signs out of the provider.
    ///
    /// "Signed out" is only shown when a session actually ended, so repeated
    /// or stray calls stay silent. The provider call is skipped only while
    /// one issued in this same epoch is still running.
    fn sign_out(&mut self, notify: bool) {
        let had_session = self.identity.is_some();
        if had_session {
            self.begin_epoch();
            self.identity = None;
            info!(epoch = self.epoch, "signing out");
            self.publish_anonymous();
            if notify {
                self.notify(Notice::SignedOut);
            }
        } else {
            self.cancel_timers();
        }

        if self.sign_out_in_flight == Some(self.epoch) {
            debug!(epoch = self.epoch, "provider sign-out already in flight");
        } else {
            let epoch = self.epoch;
            self.sign_out_in_flight = Some(epoch);
            let provider = Arc::clone(&self.provider);
            let outcomes = self.outcomes_tx.clone();
            tokio::spawn(async move {
                let result = provider.sign_out().await;
                let _ = outcomes.send(Outcome::SignOutFinished { epoch, result });
            });
        }

        if had_session {
            self.notify(Notice::Navigate {
                route: self.root_route.clone(),
            });
        }
    }

    // -- Helpers ----------------------------------------------------------

    /// Invalidates in-flight work and cancels both timers.
    fn begin_epoch(&mut self) {
        self.epoch += 1;
        self.renewal_in_flight = false;
        self.cancel_timers();
    }

    fn phase(&self) -> SessionPhase {
        self.state.borrow().phase
    }

    /// Expiry of the credential currently held, if any.
    fn current_expiry(&self) -> Option<Instant> {
        self.state.borrow().user.as_ref().map(SessionUser::expires_at)
    }

    fn publish(&self, update: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(update);
    }

    fn publish_anonymous(&self) {
        self.publish(|s| {
            s.user = None;
            s.loading = false;
            s.phase = SessionPhase::Anonymous;
        });
    }

    /// Sends a notice to the UI. Silently drops if nobody is listening.
    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}

/// Waits for the next identity change, or forever once unsubscribed.
async fn next_change(subscription: &mut Option<IdentitySubscription>) -> Option<Option<Identity>> {
    match subscription {
        Some(sub) => sub.changed().await,
        None => std::future::pending().await,
    }
}

/// Sleeps until `deadline`, or forever when no timer is armed.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
