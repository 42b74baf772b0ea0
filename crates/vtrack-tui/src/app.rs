//! Application state for the vtrack terminal client.
//!
//! `App` sits on top of `SessionManager`: it owns the login form, the idle
//! warning modal and the status line, and turns session events into screen
//! changes. All session decisions are made by the manager.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};
use vtrack_core::config::Config;
use vtrack_core::session::ActivityKind;
use vtrack_core::{
    BootstrapOutcome, Credentials, LogoutReason, SessionEvent, SessionManager, UserIdentity,
    WarningPrompt,
};

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for the login email field
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Waiting on the startup session check
    Booting,
    LoggingIn,
    Normal,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

pub struct App {
    pub state: AppState,
    pub config: Config,
    manager: SessionManager,
    session_events: broadcast::Receiver<SessionEvent>,

    // Login form
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    /// Set while the idle warning modal is up
    pub warning: Option<WarningPrompt>,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let manager = SessionManager::from_config(&config)?;
        let session_events = manager.events();
        let login_email = config.remembered_email.clone().unwrap_or_default();

        Ok(Self {
            state: AppState::Booting,
            config,
            manager,
            session_events,
            login_email,
            login_password: String::new(),
            login_focus: LoginFocus::Email,
            login_error: None,
            warning: None,
            status_message: None,
        })
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.manager.current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.manager.is_authenticated()
    }

    /// Run the startup session check and pick the first screen
    pub async fn bootstrap(&mut self) {
        match self.manager.bootstrap().await {
            BootstrapOutcome::Authenticated(user) => {
                self.status_message = Some(format!("Welcome back, {}", user.display_name()));
                self.state = AppState::Normal;
            }
            BootstrapOutcome::Anonymous => self.start_login(),
            BootstrapOutcome::Deferred => {
                self.status_message =
                    Some("Server is slow to answer; sign in to continue".to_string());
                self.start_login();
            }
        }
    }

    /// Start the login process (show login overlay)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let email = self.login_email.trim().to_string();
        if email.is_empty() || self.login_password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return Err(anyhow::anyhow!("Email and password required"));
        }

        self.login_error = None;
        let credentials = Credentials::new(email.clone(), self.login_password.clone());

        match self.manager.login(&credentials).await {
            Ok(user) => {
                self.config.remembered_email = Some(email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.login_password.clear();
                self.status_message = Some(format!("Signed in as {}", user.display_name()));
                self.state = AppState::Normal;
                Ok(())
            }
            Err(e) => {
                // SessionError's message is already written for the login form
                self.login_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Explicit logout from the main screen or the warning modal
    pub async fn logout(&mut self) {
        match self.warning.take() {
            Some(prompt) => prompt.logout_now().await,
            None => self.manager.logout().await,
        }
        self.forget_email();
        self.status_message = Some("Logged out".to_string());
        self.start_login();
    }

    /// "Stay logged in" on the warning modal
    pub fn stay_logged_in(&mut self) {
        if let Some(prompt) = self.warning.take() {
            prompt.stay_logged_in();
            self.status_message = None;
        }
    }

    pub async fn revalidate(&mut self) {
        match self.manager.revalidate().await {
            Some(user) => {
                self.status_message =
                    Some(format!("Session confirmed for {}", user.display_name()));
            }
            None => {
                self.status_message = Some("Session is no longer valid".to_string());
            }
        }
    }

    pub fn record_activity(&self, kind: ActivityKind) {
        self.manager.record_activity(kind);
    }

    /// Drain session events raised since the last frame
    pub fn check_session_events(&mut self) {
        loop {
            match self.session_events.try_recv() {
                Ok(event) => self.apply_session_event(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session event receiver lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    fn apply_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SignedIn(_) => {
                self.warning = None;
                if matches!(self.state, AppState::Booting | AppState::LoggingIn) {
                    self.state = AppState::Normal;
                }
            }
            SessionEvent::IdleWarning(prompt) => {
                self.warning = Some(prompt);
            }
            SessionEvent::IdleWarningCleared => {
                self.warning = None;
            }
            SessionEvent::SignedOut(reason) => {
                self.warning = None;
                match reason {
                    LogoutReason::IdleTimeout => {
                        info!("Signed out after inactivity");
                        self.status_message = Some("Logged out due to inactivity".to_string());
                    }
                    LogoutReason::ValidationFailed => {
                        self.status_message =
                            Some("Session expired; please sign in again".to_string());
                    }
                    LogoutReason::Explicit => {}
                }
                if self.state != AppState::Quitting {
                    self.start_login();
                }
            }
        }
    }

    /// Where to go when the quit prompt is dismissed
    pub fn cancel_quit(&mut self) {
        if self.is_authenticated() {
            self.state = AppState::Normal;
        } else {
            self.start_login();
        }
    }

    fn forget_email(&mut self) {
        self.login_email.clear();
        self.login_password.clear();
        if self.config.remembered_email.take().is_some() {
            if let Err(e) = self.config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }
    }
}

// ============================================================================
// Input helpers
// ============================================================================

fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if an email character should be accepted
pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// "m:ss" countdown for the warning modal
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> Config {
        Config {
            // Nothing listens on the discard port
            server_url: "http://127.0.0.1:9".to_string(),
            remembered_email: Some("inspector@example.com".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_can_add_email_char() {
        assert!(can_add_email_char(0, 'a'));
        assert!(can_add_email_char(0, '@'));
        assert!(can_add_email_char(253, 'z'));
        assert!(!can_add_email_char(254, 'a'));
        assert!(!can_add_email_char(0, ' '));
        assert!(!can_add_email_char(0, '\n'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(0, ' '));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\x00'));
        assert!(!can_add_password_char(0, '\r'));
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(Duration::from_secs(120)), "2:00");
        assert_eq!(format_countdown(Duration::from_secs(59)), "0:59");
        assert_eq!(format_countdown(Duration::from_millis(61_900)), "1:01");
        assert_eq!(format_countdown(Duration::ZERO), "0:00");
    }

    #[tokio::test]
    async fn test_new_app_prefills_remembered_email() {
        let mut app = App::new(offline_config()).expect("app");
        assert_eq!(app.state, AppState::Booting);
        assert_eq!(app.login_email, "inspector@example.com");

        app.start_login();
        assert_eq!(app.state, AppState::LoggingIn);
        assert_eq!(app.login_focus, LoginFocus::Password);
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let mut app = App::new(offline_config()).expect("app");
        app.start_login();

        assert!(app.attempt_login().await.is_err());
        assert_eq!(app.login_error.as_deref(), Some("Email and password required"));
        assert_eq!(app.state, AppState::LoggingIn);
        assert!(!app.is_authenticated());
    }

    #[tokio::test]
    async fn test_cancel_quit_without_session_returns_to_login() {
        let mut app = App::new(offline_config()).expect("app");
        app.state = AppState::ConfirmingQuit;
        app.cancel_quit();
        assert_eq!(app.state, AppState::LoggingIn);
    }

    #[tokio::test]
    async fn test_signed_out_event_shows_login() {
        let mut app = App::new(offline_config()).expect("app");
        app.state = AppState::Normal;

        app.apply_session_event(SessionEvent::SignedOut(LogoutReason::IdleTimeout));
        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.warning.is_none());
        assert_eq!(app.status_message.as_deref(), Some("Logged out due to inactivity"));
    }

    #[tokio::test]
    async fn test_no_events_is_a_noop() {
        let mut app = App::new(offline_config()).expect("app");
        app.check_session_events();
        assert_eq!(app.state, AppState::Booting);
        assert!(app.warning.is_none());
    }
}
