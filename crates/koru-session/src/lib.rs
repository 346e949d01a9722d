//! Session and token lifecycle management for Koru Flicks.
//!
//! This crate keeps the signed-in user continuously correct while their
//! credential quietly renews in the background:
//!
//! 1. **Observation**: follows the identity provider's change stream and
//!    publishes a [`SessionState`] (`{user, loading}`) on every transition.
//! 2. **Renewal**: renews the credential shortly before expiry, but only
//!    for users who are actually using the page.
//! 3. **Warning**: asks an active user whether to stay signed in just
//!    before the credential runs out.
//! 4. **Teardown**: signs out, surfaces one-time [`Notice`]s, and cancels
//!    everything it scheduled.
//!
//! # How it fits in the stack
//!
//! ```text
//! UI layer (above)        ← reads SessionState, shows Notices, records activity
//!     ↕
//! Session layer (this crate)  ← SessionManager actor: timers, renewal, sign-out
//!     ↕
//! Identity layer (below)  ← IdentityProvider, ProfileStore
//! ```

mod actor;
mod config;
mod error;
mod manager;
mod notice;
mod state;

pub use config::SessionConfig;
pub use error::SessionError;
pub use manager::{PendingTimers, SessionManager};
pub use notice::{Notice, NoticeReceiver, Visibility, WarningChoice};
pub use state::{SessionPhase, SessionState, SessionUser};
