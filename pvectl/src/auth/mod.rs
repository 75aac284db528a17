//! Authentication and authorization.
//!
//! Login exchanges an external identity assertion (a Google ID token) for a
//! locally signed session token. Each request then resolves its session
//! token back to a fresh account row, so admin approval or rejection takes
//! effect without waiting for the token to expire.
//!
//! # Modules
//!
//! - [`identity`]: verification of the external assertion presented at login
//! - [`session`]: signed session token creation and verification
//! - [`current_user`]: extractors resolving a session to an account and
//!   enforcing status and role

pub mod current_user;
pub mod identity;
pub mod session;

pub use current_user::{AdminAccount, CurrentAccount, ProvisionalAccount};
pub use identity::{ExternalIdentity, GoogleVerifier, IdentityVerifier};
