use async_trait::async_trait;

use crate::api::ApiError;

use super::{Credentials, UserIdentity};

/// The remote authentication service as seen by the session core.
///
/// `AuthClient` is the HTTP implementation; tests substitute a scripted one.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Ask whether the credential the client holds is still valid.
    /// `Ok(None)` means the server answered but no user is signed in.
    async fn session_status(&self) -> Result<Option<UserIdentity>, ApiError>;

    async fn login(&self, credentials: &Credentials) -> Result<UserIdentity, ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;
}
