//! Integration tests for the renewal policy.
//!
//! All instants are derived from one `now`, so no clock control is needed
//! except where the activity tracker is involved.

use std::time::Duration;

use koru_renewal::{
    ActivityTracker, Interaction, RenewalPlan, RenewalPolicy, TimerVerdict, WarningPlan,
};
use tokio::time::Instant;

const SEC: Duration = Duration::from_secs(1);
const MIN: Duration = Duration::from_secs(60);

fn policy() -> RenewalPolicy {
    RenewalPolicy::default()
}

// =========================================================================
// plan_renewal
// =========================================================================

#[test]
fn test_plan_renewal_far_expiry_schedules_five_minutes_early() {
    let now = Instant::now();
    let expires_at = now + 60 * MIN;

    assert_eq!(
        policy().plan_renewal(expires_at, now),
        RenewalPlan::At(now + 55 * MIN)
    );
}

#[test]
fn test_plan_renewal_expiry_in_four_minutes_is_immediate() {
    // refresh_at is already one minute in the past.
    let now = Instant::now();

    assert_eq!(
        policy().plan_renewal(now + 4 * MIN, now),
        RenewalPlan::Immediate
    );
}

#[test]
fn test_plan_renewal_boundary_at_sixty_seconds_is_immediate() {
    // refresh_at == now + 60s → inside the window.
    let now = Instant::now();

    assert_eq!(
        policy().plan_renewal(now + 6 * MIN, now),
        RenewalPlan::Immediate
    );
}

#[test]
fn test_plan_renewal_just_outside_window_is_scheduled() {
    let now = Instant::now();
    let expires_at = now + 6 * MIN + SEC;

    assert_eq!(
        policy().plan_renewal(expires_at, now),
        RenewalPlan::At(now + MIN + SEC)
    );
}

#[test]
fn test_plan_renewal_already_expired_is_immediate() {
    let now = Instant::now() + 10 * MIN;
    let expires_at = now - 3 * MIN;

    assert_eq!(policy().plan_renewal(expires_at, now), RenewalPlan::Immediate);
}

// =========================================================================
// plan_warning
// =========================================================================

#[test]
fn test_plan_warning_two_minutes_before_expiry() {
    let now = Instant::now();

    assert_eq!(
        policy().plan_warning(now + 60 * MIN, now),
        WarningPlan::Warn(now + 58 * MIN)
    );
}

#[test]
fn test_plan_warning_past_warning_point_waits_for_expiry() {
    let now = Instant::now();
    let expires_at = now + 90 * SEC;

    assert_eq!(
        policy().plan_warning(expires_at, now),
        WarningPlan::ExpireAt(expires_at)
    );
}

#[test]
fn test_plan_combines_both_and_reports_delays() {
    let now = Instant::now();
    let plan = policy().plan(now + 20 * MIN, now);

    assert_eq!(plan.renewal, RenewalPlan::At(now + 15 * MIN));
    assert_eq!(plan.renewal_delay(now), 15 * MIN);
    assert_eq!(plan.warning_delay(now), 18 * MIN);
}

#[test]
fn test_immediate_plan_has_zero_delay() {
    let now = Instant::now();
    let plan = policy().plan(now + 3 * MIN, now);

    assert_eq!(plan.renewal, RenewalPlan::Immediate);
    assert_eq!(plan.renewal_delay(now), Duration::ZERO);
    assert_eq!(plan.warning, WarningPlan::Warn(now + MIN));
}

// =========================================================================
// Inactivity gate
// =========================================================================

#[test]
fn test_renewal_timer_acts_for_recent_activity() {
    let now = Instant::now() + 60 * MIN;
    let last = now - 29 * MIN;

    assert_eq!(policy().on_renewal_timer(last, now), TimerVerdict::Act);
}

#[test]
fn test_renewal_timer_skips_at_exact_threshold() {
    let now = Instant::now() + 60 * MIN;
    let last = now - 30 * MIN;

    assert_eq!(policy().on_renewal_timer(last, now), TimerVerdict::Skip);
}

#[test]
fn test_warning_timer_uses_same_gate() {
    let now = Instant::now() + 60 * MIN;

    assert_eq!(policy().on_warning_timer(now - MIN, now), TimerVerdict::Act);
    assert_eq!(
        policy().on_warning_timer(now - 45 * MIN, now),
        TimerVerdict::Skip
    );
}

#[tokio::test(start_paused = true)]
async fn test_tracker_feeds_gate() {
    let tracker = ActivityTracker::new();
    let p = policy();

    tokio::time::advance(31 * MIN).await;
    assert_eq!(
        p.on_renewal_timer(tracker.last_activity(), Instant::now()),
        TimerVerdict::Skip
    );

    tracker.record(Interaction::PointerDown);
    assert_eq!(
        p.on_renewal_timer(tracker.last_activity(), Instant::now()),
        TimerVerdict::Act
    );
}

// =========================================================================
// Visibility recovery
// =========================================================================

#[test]
fn test_visibility_renewal_within_ten_minutes() {
    let now = Instant::now();
    assert!(policy().needs_visibility_renewal(now + 9 * MIN, now));
    assert!(policy().needs_visibility_renewal(now + 10 * MIN, now));
}

#[test]
fn test_visibility_renewal_not_needed_far_from_expiry() {
    let now = Instant::now();
    assert!(!policy().needs_visibility_renewal(now + 11 * MIN, now));
}

#[test]
fn test_visibility_renewal_after_expiry() {
    let now = Instant::now() + 30 * MIN;
    assert!(policy().needs_visibility_renewal(now - MIN, now));
}

// =========================================================================
// Configuration loading
// =========================================================================

#[test]
fn test_policy_deserializes_partial_json_with_defaults() {
    let p: RenewalPolicy =
        serde_json::from_str(r#"{"refresh_lead":{"secs":600,"nanos":0}}"#).unwrap();

    assert_eq!(p.refresh_lead, 10 * MIN);
    assert_eq!(p.warning_lead, RenewalPolicy::default().warning_lead);
}
