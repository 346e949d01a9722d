//! Credential renewal policy for Koru sessions.
//!
//! Decides *when* a session should renew its credential, warn the user, or
//! give up, from three inputs only: the credential's expiry, the current
//! instant, and the last user interaction. No timers live here; the
//! session actor owns those and asks this crate what to do with them.
//!
//! # Timeline
//!
//! ```text
//!   issued ──────────── refresh_at ── warn_at ── expires_at
//!                        (−5 min)     (−2 min)
//! ```
//!
//! - At `refresh_at` the credential is renewed, but only for a user active
//!   within the inactivity threshold (30 min).
//! - At `warn_at` an active user is asked whether to stay signed in.
//! - If `refresh_at` is already within the immediate window (60 s) of now,
//!   renewal happens straight away instead of being scheduled.
//!
//! # Integration
//!
//! ```ignore
//! let plan = policy.plan(credential.expires_at, Instant::now());
//! match plan.renewal {
//!     RenewalPlan::Immediate => start_renewal(),
//!     RenewalPlan::At(deadline) => renewal_at = Some(deadline),
//! }
//! ```

mod activity;

pub use activity::{ActivityTracker, Interaction};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::warn;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Lead times and thresholds that drive renewal and expiry warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenewalPolicy {
    /// Renew this long before expiry. Default: 5 minutes.
    pub refresh_lead: Duration,
    /// A renewal due within this window of now is done immediately.
    /// Default: 60 seconds.
    pub immediate_window: Duration,
    /// Warn the user this long before expiry. Default: 2 minutes.
    pub warning_lead: Duration,
    /// Users idle for at least this long are not renewed or warned.
    /// Default: 30 minutes.
    pub inactivity_threshold: Duration,
    /// When a hidden page becomes visible and expiry is this close, renew
    /// at once. Default: 10 minutes.
    pub visibility_window: Duration,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            refresh_lead: Duration::from_secs(5 * 60),
            immediate_window: Duration::from_secs(60),
            warning_lead: Duration::from_secs(2 * 60),
            inactivity_threshold: Duration::from_secs(30 * 60),
            visibility_window: Duration::from_secs(10 * 60),
        }
    }
}

impl RenewalPolicy {
    /// Smallest inactivity threshold accepted by [`validated`](Self::validated).
    pub const MIN_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(1);

    /// Fix any inconsistent values so the policy is safe to use.
    ///
    /// Rules:
    /// - `warning_lead` capped to `refresh_lead` (renewal is attempted
    ///   before the user is warned).
    /// - `inactivity_threshold` raised to [`Self::MIN_INACTIVITY_THRESHOLD`].
    pub fn validated(mut self) -> Self {
        if self.warning_lead > self.refresh_lead {
            warn!(
                warning_lead_s = self.warning_lead.as_secs(),
                refresh_lead_s = self.refresh_lead.as_secs(),
                "warning_lead exceeds refresh_lead, capping"
            );
            self.warning_lead = self.refresh_lead;
        }
        if self.inactivity_threshold < Self::MIN_INACTIVITY_THRESHOLD {
            warn!(
                inactivity_threshold_ms = self.inactivity_threshold.as_millis() as u64,
                "inactivity_threshold too small, raising"
            );
            self.inactivity_threshold = Self::MIN_INACTIVITY_THRESHOLD;
        }
        self
    }

    /// When to renew a credential that expires at `expires_at`.
    ///
    /// `Immediate` when the refresh instant is in the past or no more than
    /// `immediate_window` ahead of `now`.
    pub fn plan_renewal(&self, expires_at: Instant, now: Instant) -> RenewalPlan {
        let refresh_at = expires_at
            .checked_sub(self.refresh_lead)
            .unwrap_or(now);
        if refresh_at <= now + self.immediate_window {
            RenewalPlan::Immediate
        } else {
            RenewalPlan::At(refresh_at)
        }
    }

    /// What the warning slot should wait for.
    ///
    /// The warning itself if it is still ahead of `now`, otherwise the hard
    /// expiry.
    pub fn plan_warning(&self, expires_at: Instant, now: Instant) -> WarningPlan {
        match expires_at.checked_sub(self.warning_lead) {
            Some(warn_at) if warn_at > now => WarningPlan::Warn(warn_at),
            _ => WarningPlan::ExpireAt(expires_at),
        }
    }

    /// Both plans for one credential.
    pub fn plan(&self, expires_at: Instant, now: Instant) -> SchedulePlan {
        SchedulePlan {
            renewal: self.plan_renewal(expires_at, now),
            warning: self.plan_warning(expires_at, now),
        }
    }

    /// Whether a user last seen at `last_activity` still counts as active.
    pub fn is_active(&self, last_activity: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_activity) < self.inactivity_threshold
    }

    /// Verdict for a renewal timer that just fired.
    pub fn on_renewal_timer(&self, last_activity: Instant, now: Instant) -> TimerVerdict {
        TimerVerdict::from_active(self.is_active(last_activity, now))
    }

    /// Verdict for a warning timer that just fired.
    pub fn on_warning_timer(&self, last_activity: Instant, now: Instant) -> TimerVerdict {
        TimerVerdict::from_active(self.is_active(last_activity, now))
    }

    /// Whether a page that just became visible should renew immediately.
    pub fn needs_visibility_renewal(&self, expires_at: Instant, now: Instant) -> bool {
        expires_at.saturating_duration_since(now) <= self.visibility_window
    }
}

// ---------------------------------------------------------------------------
// Plans and verdicts
// ---------------------------------------------------------------------------

/// When to renew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalPlan {
    /// Renew now; do not arm a timer.
    Immediate,
    /// Arm the renewal timer for this instant.
    At(Instant),
}

/// What the warning slot waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningPlan {
    /// Ask the user to stay signed in at this instant.
    Warn(Instant),
    /// Too late to warn; the credential expires at this instant.
    ExpireAt(Instant),
}

impl WarningPlan {
    /// The instant the slot fires.
    pub fn deadline(&self) -> Instant {
        match self {
            Self::Warn(at) | Self::ExpireAt(at) => *at,
        }
    }
}

/// The full schedule for one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePlan {
    pub renewal: RenewalPlan,
    pub warning: WarningPlan,
}

impl SchedulePlan {
    /// Delay until renewal; zero when immediate.
    pub fn renewal_delay(&self, now: Instant) -> Duration {
        match self.renewal {
            RenewalPlan::Immediate => Duration::ZERO,
            RenewalPlan::At(at) => at.saturating_duration_since(now),
        }
    }

    /// Delay until the warning slot fires.
    pub fn warning_delay(&self, now: Instant) -> Duration {
        self.warning.deadline().saturating_duration_since(now)
    }
}

/// What to do when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerVerdict {
    /// The user is active; go ahead.
    Act,
    /// The user is idle; leave the session alone.
    Skip,
}

impl TimerVerdict {
    fn from_active(active: bool) -> Self {
        if active { Self::Act } else { Self::Skip }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(60);

    #[test]
    fn test_default_policy_constants() {
        let p = RenewalPolicy::default();
        assert_eq!(p.refresh_lead, 5 * MIN);
        assert_eq!(p.immediate_window, Duration::from_secs(60));
        assert_eq!(p.warning_lead, 2 * MIN);
        assert_eq!(p.inactivity_threshold, 30 * MIN);
        assert_eq!(p.visibility_window, 10 * MIN);
    }

    #[test]
    fn test_validated_caps_warning_lead() {
        let p = RenewalPolicy {
            warning_lead: 10 * MIN,
            ..RenewalPolicy::default()
        }
        .validated();
        assert_eq!(p.warning_lead, p.refresh_lead);
    }

    #[test]
    fn test_validated_raises_zero_inactivity_threshold() {
        let p = RenewalPolicy {
            inactivity_threshold: Duration::ZERO,
            ..RenewalPolicy::default()
        }
        .validated();
        assert_eq!(p.inactivity_threshold, RenewalPolicy::MIN_INACTIVITY_THRESHOLD);
    }

    #[test]
    fn test_validated_leaves_defaults_untouched() {
        assert_eq!(RenewalPolicy::default().validated(), RenewalPolicy::default());
    }

    #[test]
    fn test_warning_plan_deadline() {
        let now = Instant::now();
        assert_eq!(WarningPlan::Warn(now).deadline(), now);
        assert_eq!(WarningPlan::ExpireAt(now + MIN).deadline(), now + MIN);
    }
}
