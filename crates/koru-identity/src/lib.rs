//! Identity and profile records for Koru sessions.
//!
//! This crate defines the two collaborators a session manager talks to and
//! the records that flow between them:
//!
//! - **Records** ([`Identity`], [`Credential`], [`Claims`], [`Profile`]):
//!   explicitly typed, with required vs. optional fields spelled out.
//! - **Collaborators** ([`IdentityProvider`], [`ProfileStore`]): the
//!   sign-in backend and the profile document store.
//! - **In-memory implementations** ([`MemoryIdentityProvider`],
//!   [`MemoryProfileStore`]): for tests, demos and local development.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (koru-session)  ← observes identities, fetches profiles
//!     ↕
//! Identity Layer (this crate)   ← records + provider/store traits
//! ```

mod error;
mod memory;
mod profile;
mod provider;
mod types;

pub use error::{IdentityError, ProfileError};
pub use memory::{MemoryIdentityProvider, MemoryProfileStore};
pub use profile::{DEFAULT_ROLE, Profile, ProfileStore, default_roles};
pub use provider::{IdentityProvider, IdentitySubscription};
pub use types::{Claims, Credential, Identity, UserId};
