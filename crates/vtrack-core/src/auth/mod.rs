//! Authentication module: who the user is and how the server confirms it.
//!
//! This module provides:
//! - `UserIdentity` / `Credentials`: the user record and login form payload
//! - `AuthBackend`: the seam to the remote authentication service
//! - `CredentialValidator`: the one-shot "is my session still valid?" check

pub mod backend;
pub mod identity;
pub mod validator;

pub use backend::AuthBackend;
pub use identity::{Credentials, Role, UserIdentity};
pub use validator::CredentialValidator;
