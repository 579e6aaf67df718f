//! Client for the backend's authentication endpoint.
//!
//! End-user flows (sign-in, refresh, user fetch, sign-out) use the anonymous
//! key plus the caller's token. Admin user management needs the service key.

pub mod admin;
pub mod client;
pub mod error;
pub mod models;

pub use client::AuthClient;
pub use error::{AuthError, Result};
pub use models::{AuthSession, AuthUser, NewUser, UserPatch, UserSummary};
