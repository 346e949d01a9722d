//! # Koru
//!
//! Session lifecycle toolkit for the Koru Flicks client.
//!
//! Koru keeps the signed-in user continuously correct: it follows the
//! identity provider, merges the stored profile, renews the credential
//! shortly before it expires (only while the user is actually around),
//! warns before expiry, and tears everything down cleanly on sign-out.
//!
//! This crate re-exports the layers so applications depend on one crate:
//!
//! | layer | crate |
//! |-------|-------|
//! | identity records and collaborators | [`identity`] |
//! | renewal scheduling policy | [`renewal`] |
//! | the session manager | [`session`] |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use koru::prelude::*;
//!
//! # async fn run() -> Result<(), KoruError> {
//! koru::init_tracing();
//!
//! let provider = Arc::new(MemoryIdentityProvider::new());
//! provider.register("ada@example.com", "hunter2", "Ada");
//! let store = Arc::new(MemoryProfileStore::new());
//!
//! let (manager, mut notices) =
//!     SessionManager::start(provider, store, SessionConfig::default());
//! manager.sign_in("ada@example.com", "hunter2").await?;
//!
//! while let Some(notice) = notices.recv().await {
//!     println!("{notice:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod telemetry;

pub use error::KoruError;
pub use telemetry::{DEFAULT_FILTER, init_tracing, init_tracing_with};

pub use koru_identity as identity;
pub use koru_renewal as renewal;
pub use koru_session as session;

/// The types most applications need.
pub mod prelude {
    pub use crate::KoruError;
    pub use koru_identity::{
        Claims, Credential, Identity, IdentityError, IdentityProvider, MemoryIdentityProvider,
        MemoryProfileStore, Profile, ProfileError, ProfileStore, UserId,
    };
    pub use koru_renewal::{ActivityTracker, Interaction, RenewalPolicy};
    pub use koru_session::{
        Notice, NoticeReceiver, SessionConfig, SessionError, SessionManager, SessionPhase,
        SessionState, SessionUser, Visibility, WarningChoice,
    };
}
