//! Last-interaction tracking.
//!
//! Every pointer-down, key-press, scroll and touch-start lands here, so a
//! write must be one atomic store with no lock.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// The interactions that count as "the user is here".
///
/// Every kind counts the same towards activity; the kind only shows up in
/// trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interaction {
    PointerDown,
    KeyPress,
    Scroll,
    TouchStart,
}

/// Shared record of the most recent user interaction.
///
/// Cheap to clone; clones share the same timestamp. Stored as milliseconds
/// since the tracker was created, so the value fits in one `AtomicU64`.
#[derive(Clone)]
pub struct ActivityTracker {
    base: Instant,
    last_ms: Arc<AtomicU64>,
}

impl ActivityTracker {
    /// Creates a tracker. Creation counts as activity.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records an interaction of the given kind.
    pub fn record(&self, interaction: Interaction) {
        trace!(?interaction, "user activity");
        self.touch();
    }

    /// Marks "now" as the last interaction.
    pub fn touch(&self) {
        let elapsed = Instant::now().saturating_duration_since(self.base);
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.last_ms.fetch_max(ms, Ordering::Relaxed);
    }

    /// The instant of the last recorded interaction.
    pub fn last_activity(&self) -> Instant {
        self.base + Duration::from_millis(self.last_ms.load(Ordering::Relaxed))
    }

    /// How long the user has been idle at `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActivityTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityTracker")
            .field("last_activity_ms", &self.last_ms.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_new_tracker_counts_creation_as_activity() {
        let tracker = ActivityTracker::new();
        assert_eq!(tracker.idle_for(Instant::now()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_moves_last_activity_forward() {
        let tracker = ActivityTracker::new();
        tokio::time::advance(Duration::from_secs(90)).await;

        tracker.record(Interaction::KeyPress);

        assert_eq!(tracker.idle_for(Instant::now()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_every_kind_counts_as_activity() {
        let tracker = ActivityTracker::new();
        let kinds = [
            Interaction::PointerDown,
            Interaction::KeyPress,
            Interaction::Scroll,
            Interaction::TouchStart,
        ];

        for kind in kinds {
            tokio::time::advance(Duration::from_secs(30)).await;
            let before = tracker.last_activity();

            tracker.record(kind);

            assert!(tracker.last_activity() > before, "{kind:?} was not recorded");
            assert_eq!(tracker.idle_for(Instant::now()), Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_timestamp() {
        let tracker = ActivityTracker::new();
        let ui_side = tracker.clone();
        tokio::time::advance(Duration::from_secs(10)).await;

        ui_side.record(Interaction::Scroll);

        assert_eq!(tracker.last_activity(), ui_side.last_activity());
        assert_eq!(tracker.idle_for(Instant::now()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_for_grows_without_interaction() {
        let tracker = ActivityTracker::new();
        tokio::time::advance(Duration::from_secs(45 * 60)).await;

        assert_eq!(tracker.idle_for(Instant::now()), Duration::from_secs(45 * 60));
    }
}
