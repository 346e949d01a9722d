//! Walkthrough of a session's life against the in-memory collaborators.
//!
//! Timings are scaled down so the whole thing runs in under a minute:
//! tokens live 20 seconds, renewal is attempted 5 seconds before expiry and
//! users idle for 8 seconds count as away.
//!
//! Run with `RUST_LOG=koru_session=debug,info` to see every timer decision.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use koru::prelude::*;
use tokio::time::{self, Instant};
use tracing::info;

const TOKEN_TTL: Duration = Duration::from_secs(20);

fn demo_config() -> SessionConfig {
    SessionConfig {
        policy: RenewalPolicy {
            refresh_lead: Duration::from_secs(5),
            immediate_window: Duration::from_secs(1),
            warning_lead: Duration::from_secs(2),
            inactivity_threshold: Duration::from_secs(8),
            visibility_window: Duration::from_secs(10),
        },
        ..SessionConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Scenes
// ---------------------------------------------------------------------------

/// Runs for `duration`, answering notices as a UI would. With `active`, the
/// user clicks around every two seconds.
async fn play(
    manager: &SessionManager,
    notices: &mut NoticeReceiver,
    duration: Duration,
    active: bool,
) -> Result<(), KoruError> {
    let deadline = Instant::now() + duration;
    let mut clicks = time::interval(Duration::from_secs(2));

    loop {
        tokio::select! {
            () = time::sleep_until(deadline) => return Ok(()),
            _ = clicks.tick(), if active => manager.record_activity(Interaction::PointerDown),
            notice = notices.recv() => match notice {
                Some(notice) => answer(manager, notice).await?,
                None => return Ok(()),
            },
        }
    }
}

async fn answer(manager: &SessionManager, notice: Notice) -> Result<(), KoruError> {
    match notice {
        Notice::ExpiryWarning { expires_in } => {
            info!(expires_in_s = expires_in.as_secs(), "dialog: your session is about to expire");
            info!("user clicks \"stay signed in\"");
            manager.resolve_warning(WarningChoice::StaySignedIn).await?;
        }
        Notice::SessionExpired { return_to } => {
            info!(?return_to, "toast: your session expired, please sign in again");
        }
        Notice::SignedOut => info!("toast: you have been signed out"),
        Notice::SignOutFailed { reason } => {
            info!(%reason, "toast: sign-out did not reach the server");
        }
        Notice::Navigate { route } => info!(%route, "router: navigating"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), KoruError> {
    koru::init_tracing();

    let provider = Arc::new(MemoryIdentityProvider::with_token_ttl(TOKEN_TTL));
    let ada = provider.register("ada@example.com", "analytical-engine", "Ada");
    let store = Arc::new(MemoryProfileStore::new());
    store.insert(ada, Profile::named("Ada", "Lovelace").with_role("admin"));

    let (manager, mut notices) =
        SessionManager::start(Arc::clone(&provider), store, demo_config());

    let mut updates = Box::pin(manager.updates());
    let watcher = tokio::spawn(async move {
        while let Some(state) = updates.next().await {
            match &state.user {
                Some(user) => info!(
                    phase = ?state.phase,
                    name = %user.full_name,
                    roles = ?user.roles,
                    valid_for_s = user.credential.remaining(Instant::now()).as_secs(),
                    "session state"
                ),
                None => info!(phase = ?state.phase, loading = state.loading, "session state"),
            }
        }
    });

    manager.set_route("/browse/trending").await?;
    let identity = manager.sign_in("ada@example.com", "analytical-engine").await?;
    info!(user_id = %identity.id, "signed in");

    info!("scene 1: browsing; the credential renews before it expires");
    play(&manager, &mut notices, Duration::from_secs(17), true).await?;

    info!("scene 2: user steps away, comes back just before the warning");
    play(&manager, &mut notices, Duration::from_secs(14), false).await?;
    manager.record_activity(Interaction::KeyPress);
    play(&manager, &mut notices, Duration::from_secs(4), false).await?;

    info!("scene 3: tab hidden and shown again close to expiry");
    manager.visibility_changed(Visibility::Hidden).await?;
    play(&manager, &mut notices, Duration::from_secs(9), true).await?;
    manager.visibility_changed(Visibility::Visible).await?;
    play(&manager, &mut notices, Duration::from_secs(1), true).await?;

    info!("scene 4: sign out");
    manager.sign_out(true).await?;
    play(&manager, &mut notices, Duration::from_secs(1), false).await?;

    info!(
        renewals = provider.refresh_calls(),
        sign_outs = provider.sign_out_calls(),
        "provider call counts"
    );

    manager.shutdown().await;
    watcher.abort();
    Ok(())
}
