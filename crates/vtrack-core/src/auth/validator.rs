use std::sync::Arc;

use tracing::debug;

use crate::session::SessionError;

use super::{AuthBackend, UserIdentity};

/// Confirms server-side session validity with a single status round-trip.
///
/// Holds no state between calls; every failure mode collapses to "no session".
#[derive(Clone)]
pub struct CredentialValidator {
    backend: Arc<dyn AuthBackend>,
}

impl CredentialValidator {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        Self { backend }
    }

    /// Exactly one status call, no retry.
    pub async fn check(&self) -> Result<UserIdentity, SessionError> {
        match self.backend.session_status().await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(SessionError::ValidationFailure(None)),
            Err(e) => Err(SessionError::ValidationFailure(Some(e))),
        }
    }

    pub async fn validate(&self) -> Option<UserIdentity> {
        match self.check().await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "Session validation failed, treating as signed out");
                None
            }
        }
    }
}
