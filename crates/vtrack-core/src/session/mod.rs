//! Session lifecycle and idle timeout.
//!
//! This module provides:
//! - `SessionStore`: the single source of truth for who is signed in
//! - `ActivitySignals`: the user activity listener registry
//! - `IdleTimer`: warning and forced-logout timers, rearmed on activity
//! - `SessionManager`: the facade tying the above to the auth backend

pub mod activity;
pub mod error;
pub mod facade;
pub mod idle;
pub mod store;

pub use activity::{ActivityKind, ActivitySignals, ListenerId};
pub use error::{login_failure_message, SessionError, SettingsError};
pub use facade::{
    BootstrapOutcome, LogoutReason, SessionEvent, SessionManager, SessionSettings, WarningPrompt,
    DEFAULT_BOOTSTRAP_FALLBACK,
};
pub use idle::{IdleObserver, IdleSettings, IdleState, IdleTimer};
pub use store::{Session, SessionData, SessionStore};
