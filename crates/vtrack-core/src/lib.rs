//! Client-side session handling for the violation tracker.
//!
//! The `vtrack-tui` binary builds on this crate; everything that decides
//! whether a user is signed in lives here.

pub mod api;
pub mod auth;
pub mod config;
pub mod session;

#[cfg(test)]
mod testing;

pub use api::{ApiError, AuthClient};
pub use auth::{AuthBackend, Credentials, Role, UserIdentity};
pub use config::Config;
pub use session::{
    ActivityKind, BootstrapOutcome, IdleState, LogoutReason, SessionError, SessionEvent,
    SessionManager, SessionSettings, WarningPrompt,
};
