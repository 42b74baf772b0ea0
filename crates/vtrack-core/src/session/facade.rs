//! Session lifecycle facade.
//!
//! `SessionManager` is the one entry point the UI talks to. It owns the
//! session store, the idle timer and the activity registry, and it is the only
//! writer of the store: login, logout, validation and forced idle logout all
//! go through the same establish/teardown pair so the activity listener and
//! the timers always live and die with the session.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::api::AuthClient;
use crate::auth::{AuthBackend, CredentialValidator, Credentials, UserIdentity};
use crate::config::Config;

use super::activity::{ActivityKind, ActivitySignals, ListenerId};
use super::idle::{IdleObserver, IdleSettings, IdleState, IdleTimer};
use super::{Session, SessionError, SessionStore};

// ============================================================================
// Constants
// ============================================================================

/// How long `bootstrap` waits for the status check before giving up on it.
pub const DEFAULT_BOOTSTRAP_FALLBACK: Duration = Duration::from_secs(5);

/// Buffer size for the session event broadcast channel.
/// Events are rare (sign in/out, warnings); 32 leaves plenty of headroom.
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub idle: IdleSettings,
    pub bootstrap_fallback: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle: IdleSettings::default(),
            bootstrap_fallback: DEFAULT_BOOTSTRAP_FALLBACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    Explicit,
    IdleTimeout,
    ValidationFailed,
}

/// Notifications for UI subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SignedIn(UserIdentity),
    IdleWarning(WarningPrompt),
    /// Activity (or "stay logged in") dismissed the warning
    IdleWarningCleared,
    SignedOut(LogoutReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Authenticated(UserIdentity),
    Anonymous,
    /// The fallback deadline passed first; the status check keeps running and
    /// its answer is applied when it arrives.
    Deferred,
}

/// Handle given to the idle warning modal.
///
/// Holds the session weakly: once the manager is gone the actions do nothing.
#[derive(Clone)]
pub struct WarningPrompt {
    core: Weak<SessionCore>,
    epoch: u64,
    logout_at: Instant,
}

impl WarningPrompt {
    /// Time left before the forced logout
    pub fn logout_in(&self) -> Duration {
        self.logout_at.saturating_duration_since(Instant::now())
    }

    /// Whether this warning is still the one on screen
    pub fn is_current(&self) -> bool {
        self.core.upgrade().is_some_and(|core| {
            core.idle.is_current(self.epoch) && core.idle.state() == IdleState::WarningShown
        })
    }

    pub fn stay_logged_in(&self) -> bool {
        match self.core.upgrade() {
            Some(core) => {
                info!("User chose to stay logged in");
                core.idle.on_activity()
            }
            None => false,
        }
    }

    pub async fn logout_now(&self) {
        if let Some(core) = self.core.upgrade() {
            SessionManager { core }.logout().await;
        }
    }
}

impl fmt::Debug for WarningPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarningPrompt")
            .field("epoch", &self.epoch)
            .field("logout_in", &self.logout_in())
            .finish()
    }
}

struct Lifecycle {
    /// Activity listener attached while a session exists
    listener: Option<ListenerId>,
    /// Bumped on every session change; in-flight validations compare against it
    generation: u64,
    loading: bool,
    last_error: Option<String>,
    /// Server logout spawned by a forced logout; shares the cookie jar with
    /// the next login, so that login waits for it
    pending_logout: Option<JoinHandle<()>>,
}

struct SessionCore {
    me: Weak<SessionCore>,
    backend: Arc<dyn AuthBackend>,
    validator: CredentialValidator,
    store: SessionStore,
    idle: IdleTimer,
    activity: ActivitySignals,
    events: broadcast::Sender<SessionEvent>,
    lifecycle: Mutex<Lifecycle>,
    settings: SessionSettings,
}

impl SessionCore {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Make `user` the signed-in user. With `expected_generation`, the change
    /// is dropped if the session moved on since the caller looked.
    fn establish(&self, user: UserIdentity, expected_generation: Option<u64>) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if expected_generation.is_some_and(|g| g != lifecycle.generation) {
            debug!("Discarding stale session validation result");
            return false;
        }

        // Revalidation of the current user is not activity; a login is
        if expected_generation.is_some() && self.store.user().as_ref() == Some(&user) {
            return true;
        }

        lifecycle.generation += 1;
        self.store.set(Session::signed_in(user.clone()));

        if lifecycle.listener.is_none() {
            let idle = self.idle.clone();
            lifecycle.listener = Some(self.activity.add_listener(&ActivityKind::ALL, move |_| {
                idle.on_activity();
            }));
        }
        self.idle.arm();
        drop(lifecycle);

        info!(user = %user.email, admin = user.is_admin(), "Session established");
        self.emit(SessionEvent::SignedIn(user));
        true
    }

    /// Drop the session, its timers and its activity listener. Caller holds
    /// the lifecycle lock.
    fn teardown(&self, lifecycle: &mut Lifecycle) -> bool {
        let had_session = self.store.clear();
        self.idle.cancel();
        if let Some(id) = lifecycle.listener.take() {
            self.activity.remove_listener(id);
        }
        if had_session {
            lifecycle.generation += 1;
        }
        had_session
    }

    fn clear(&self, reason: LogoutReason, expected_generation: Option<u64>) -> bool {
        let cleared = {
            let mut lifecycle = self.lifecycle.lock();
            if expected_generation.is_some_and(|g| g != lifecycle.generation) {
                debug!(?reason, "Discarding stale session clear");
                return false;
            }
            self.teardown(&mut lifecycle)
        };

        if cleared {
            info!(?reason, "Session cleared");
            self.emit(SessionEvent::SignedOut(reason));
        }
        cleared
    }

    async fn apply_validation(&self, generation: u64) -> BootstrapOutcome {
        match self.validator.validate().await {
            Some(user) => {
                self.establish(user, Some(generation));
            }
            None => {
                self.clear(LogoutReason::ValidationFailed, Some(generation));
            }
        }

        match self.store.user() {
            Some(user) => BootstrapOutcome::Authenticated(user),
            None => BootstrapOutcome::Anonymous,
        }
    }

    fn notify_server_logout(&self) -> JoinHandle<()> {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(e) = backend.logout().await {
                let err = SessionError::Transport(e);
                warn!(error = %err, "Server logout after idle timeout failed");
            }
        })
    }
}

impl IdleObserver for SessionCore {
    fn idle_warning(&self, epoch: u64, logout_at: Instant) {
        self.emit(SessionEvent::IdleWarning(WarningPrompt {
            core: self.me.clone(),
            epoch,
            logout_at,
        }));
    }

    fn idle_resumed(&self) {
        self.emit(SessionEvent::IdleWarningCleared);
    }

    fn idle_expired(&self, epoch: u64) {
        let cleared = {
            let mut lifecycle = self.lifecycle.lock();
            if !self.idle.expire(epoch) {
                return;
            }
            let cleared = self.teardown(&mut lifecycle);
            if cleared {
                lifecycle.pending_logout = Some(self.notify_server_logout());
            }
            cleared
        };

        if cleared {
            info!("Logging out due to inactivity");
            self.emit(SessionEvent::SignedOut(LogoutReason::IdleTimeout));
        }
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        self.idle.cancel();
    }
}

/// Entry point for everything session related. Clones share one session.
///
/// Methods that arm timers must run inside a Tokio runtime.
#[derive(Clone)]
pub struct SessionManager {
    core: Arc<SessionCore>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AuthBackend>, settings: SessionSettings) -> Self {
        let store = SessionStore::new();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let core = Arc::new_cyclic(|me: &Weak<SessionCore>| {
            let observer: Weak<dyn IdleObserver> = me.clone();
            SessionCore {
                me: me.clone(),
                validator: CredentialValidator::new(Arc::clone(&backend)),
                backend,
                idle: IdleTimer::new(settings.idle, store.clone(), observer),
                store,
                activity: ActivitySignals::new(),
                events,
                lifecycle: Mutex::new(Lifecycle {
                    listener: None,
                    generation: 0,
                    loading: true,
                    last_error: None,
                    pending_logout: None,
                }),
                settings,
            }
        });

        Self { core }
    }

    /// Build a manager talking HTTP to the configured server
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = config.session_settings()?;
        let client = AuthClient::with_timeout(&config.server_url, config.request_timeout())?;
        Ok(Self::new(Arc::new(client), settings))
    }

    /// Check the server-side session once at startup.
    ///
    /// Never waits longer than the bootstrap fallback deadline; a late answer
    /// still updates the session.
    pub async fn bootstrap(&self) -> BootstrapOutcome {
        let generation = self.core.lifecycle.lock().generation;
        let core = Arc::clone(&self.core);
        let mut validation =
            tokio::spawn(async move { core.apply_validation(generation).await });

        let fallback = self.core.settings.bootstrap_fallback;
        let outcome = match tokio::time::timeout(fallback, &mut validation).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "Session check task failed");
                BootstrapOutcome::Anonymous
            }
            Err(_) => {
                warn!(
                    fallback_secs = fallback.as_secs(),
                    "Session check still pending, continuing signed out"
                );
                BootstrapOutcome::Deferred
            }
        };

        self.core.lifecycle.lock().loading = false;
        debug!(?outcome, "Bootstrap finished");
        outcome
    }

    /// Re-run the status check now. A failure signs the user out.
    pub async fn revalidate(&self) -> Option<UserIdentity> {
        let generation = self.core.lifecycle.lock().generation;
        match self.core.apply_validation(generation).await {
            BootstrapOutcome::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<UserIdentity, SessionError> {
        let pending_logout = {
            let mut lifecycle = self.core.lifecycle.lock();
            lifecycle.last_error = None;
            lifecycle.pending_logout.take()
        };
        if let Some(handle) = pending_logout {
            debug!("Waiting for server logout before signing in again");
            let _ = handle.await;
        }
        info!(email = %credentials.email, "Attempting login");

        match self.core.backend.login(credentials).await {
            Ok(user) => {
                self.core.establish(user.clone(), None);
                Ok(user)
            }
            Err(e) => {
                let err = SessionError::authentication(e);
                error!(error = %err, "Login failed");
                self.core.lifecycle.lock().last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Sign out locally right away, then tell the server. A failed server
    /// call is logged and otherwise ignored.
    pub async fn logout(&self) {
        info!("Logging out");
        self.core.clear(LogoutReason::Explicit, None);

        if let Err(e) = self.core.backend.logout().await {
            let err = SessionError::Transport(e);
            warn!(error = %err, "Server logout failed; local session already cleared");
        }
    }

    /// The warning modal's "stay logged in" action
    pub fn stay_logged_in(&self) -> bool {
        self.core.idle.on_activity()
    }

    /// Feed one user interaction into the activity listeners
    pub fn record_activity(&self, kind: ActivityKind) -> usize {
        self.core.activity.dispatch(kind)
    }

    pub fn is_authenticated(&self) -> bool {
        self.core.store.is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.core.store.user()
    }

    pub fn is_admin(&self) -> bool {
        self.core.store.user().is_some_and(|u| u.is_admin())
    }

    pub fn session(&self) -> Session {
        self.core.store.get()
    }

    /// True until `bootstrap` resolves
    pub fn is_loading(&self) -> bool {
        self.core.lifecycle.lock().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.core.lifecycle.lock().last_error.clone()
    }

    pub fn idle_state(&self) -> IdleState {
        self.core.idle.state()
    }

    pub fn live_timers(&self) -> usize {
        self.core.idle.live_timers()
    }

    pub fn activity_listeners(&self) -> usize {
        self.core.activity.listener_count()
    }

    pub fn activity(&self) -> ActivitySignals {
        self.core.activity.clone()
    }

    pub fn settings(&self) -> SessionSettings {
        self.core.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.core.store.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.core.events.subscribe()
    }
}
