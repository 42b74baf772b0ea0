use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum SessionError {
    /// The status check could not confirm a session. Never shown to the user.
    #[error("Session could not be confirmed")]
    ValidationFailure(#[source] Option<ApiError>),

    /// Login was rejected; `message` is fit for the login form.
    #[error("{message}")]
    Authentication {
        message: String,
        #[source]
        source: ApiError,
    },

    /// The server could not be told about a logout. Local state is cleared regardless.
    #[error("Logout notification failed: {0}")]
    Transport(#[source] ApiError),
}

impl SessionError {
    pub fn authentication(source: ApiError) -> Self {
        SessionError::Authentication {
            message: login_failure_message(&source),
            source,
        }
    }
}

/// Map a login failure to something a user can act on.
pub fn login_failure_message(error: &ApiError) -> String {
    match error {
        ApiError::Rejected(msg) => msg.clone(),
        ApiError::Unauthorized => "Invalid email or password".to_string(),
        e if e.is_timeout() => "Connection timed out. Please try again.".to_string(),
        e if e.is_connect() => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        _ => "Login failed".to_string(),
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Idle timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Warning lead time ({lead:?}) must be shorter than the idle timeout ({timeout:?})")]
    WarningNotBeforeTimeout { lead: Duration, timeout: Duration },
}
