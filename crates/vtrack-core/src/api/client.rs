//! HTTP client for the violation tracker's JWT auth endpoints.
//!
//! The server issues the JWT as an HTTP-only cookie on login and reads it back
//! on every request, so `AuthClient` keeps a cookie store for its lifetime.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::debug;

use crate::auth::{AuthBackend, Credentials, UserIdentity};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Session status check (JWT cookie based)
const STATUS_PATH: &str = "/api/auth/status-jwt";

/// Login endpoint; CSRF exempt, sets the JWT cookie
const LOGIN_PATH: &str = "/api/auth/login-jwt";

/// Logout endpoint; clears the JWT cookie server-side
const LOGOUT_PATH: &str = "/api/auth/logout-jwt";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    user: Option<UserIdentity>,
}

/// API client for the auth service.
/// Clone is cheap - reqwest::Client uses Arc internally, so clones share the
/// connection pool and the cookie jar.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    /// Create a new client against `base_url` (e.g. `http://localhost:5000`)
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: Self::normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn normalize_base_url(base_url: &str) -> String {
        base_url.trim().trim_end_matches('/').to_string()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_envelope(response: reqwest::Response) -> Result<UserEnvelope, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse user payload: {}", e)))
    }
}

#[async_trait]
impl AuthBackend for AuthClient {
    async fn session_status(&self) -> Result<Option<UserIdentity>, ApiError> {
        let response = self
            .client
            .get(self.url(STATUS_PATH))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        // A missing or expired cookie is an answer, not a failure
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("Status check returned 401");
            return Ok(None);
        }

        let response = Self::check_response(response).await?;
        Ok(Self::parse_envelope(response).await?.user)
    }

    async fn login(&self, credentials: &Credentials) -> Result<UserIdentity, ApiError> {
        debug!(email = %credentials.email, "Sending login request");

        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .header(header::ACCEPT, "application/json")
            .json(credentials)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse_envelope(response)
            .await?
            .user
            .ok_or_else(|| {
                ApiError::InvalidResponse("Login response missing user data".to_string())
            })
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }
}
