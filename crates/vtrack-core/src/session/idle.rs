//! Idle timeout coordination.
//!
//! `IdleTimer` owns the warning timer and the forced-logout timer. Both are
//! scheduled from the same instant whenever the timer is armed, so the logout
//! deadline never waits on the warning being shown. Every arm or cancel bumps
//! an epoch; a timer task whose epoch is stale does nothing even if it was
//! already running when it was replaced.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::{SessionStore, SettingsError};

/// Time from last activity to forced logout
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How long before the forced logout the warning appears
pub const DEFAULT_WARNING_LEAD: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleSettings {
    timeout: Duration,
    warning_lead: Duration,
}

impl Default for IdleSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_IDLE_TIMEOUT,
            warning_lead: DEFAULT_WARNING_LEAD,
        }
    }
}

impl IdleSettings {
    pub fn new(timeout: Duration, warning_lead: Duration) -> Result<Self, SettingsError> {
        if timeout.is_zero() {
            return Err(SettingsError::ZeroTimeout);
        }
        if warning_lead >= timeout {
            return Err(SettingsError::WarningNotBeforeTimeout {
                lead: warning_lead,
                timeout,
            });
        }
        Ok(Self {
            timeout,
            warning_lead,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn warning_lead(&self) -> Duration {
        self.warning_lead
    }

    /// Delay from arming until the warning fires
    pub fn warning_after(&self) -> Duration {
        self.timeout - self.warning_lead
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum IdleState {
    /// No session, nothing armed
    #[default]
    Inactive,
    Active,
    WarningShown,
}

/// Receives timer outcomes. Implemented by the session facade.
pub trait IdleObserver: Send + Sync {
    /// The warning deadline passed with no activity.
    fn idle_warning(&self, epoch: u64, logout_at: Instant);

    /// Activity rearmed the timers while the warning was showing.
    fn idle_resumed(&self);

    /// The logout deadline passed. The observer must call
    /// [`IdleTimer::expire`] with `epoch` to claim the expiry.
    fn idle_expired(&self, epoch: u64);
}

struct TimerPair {
    warning: JoinHandle<()>,
    logout: JoinHandle<()>,
    logout_at: Instant,
}

impl TimerPair {
    fn abort(self) {
        self.warning.abort();
        self.logout.abort();
    }

    fn live(&self) -> usize {
        [&self.warning, &self.logout]
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }
}

#[derive(Default)]
struct IdleInner {
    state: IdleState,
    epoch: u64,
    timers: Option<TimerPair>,
}

/// Clones share the same timers and state.
#[derive(Clone)]
pub struct IdleTimer {
    inner: Arc<Mutex<IdleInner>>,
    settings: IdleSettings,
    store: SessionStore,
    observer: Weak<dyn IdleObserver>,
}

impl IdleTimer {
    pub fn new(
        settings: IdleSettings,
        store: SessionStore,
        observer: Weak<dyn IdleObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(IdleInner::default())),
            settings,
            store,
            observer,
        }
    }

    pub fn settings(&self) -> IdleSettings {
        self.settings
    }

    /// Replace any scheduled timers with a fresh pair measured from now.
    ///
    /// Only arms while a session exists; returns whether a pair was scheduled.
    /// Must be called from within a Tokio runtime.
    pub fn arm(&self) -> bool {
        let (armed, resumed) = {
            let mut inner = self.inner.lock();
            let was_warning = inner.state == IdleState::WarningShown;

            if let Some(pair) = inner.timers.take() {
                pair.abort();
            }
            inner.epoch += 1;

            if !self.store.is_authenticated() {
                inner.state = IdleState::Inactive;
                (false, false)
            } else {
                let epoch = inner.epoch;
                let now = Instant::now();
                let warn_at = now + self.settings.warning_after();
                let logout_at = now + self.settings.timeout;

                let timer = self.clone();
                let warning = tokio::spawn(async move {
                    sleep_until(warn_at).await;
                    timer.fire_warning(epoch, logout_at);
                });

                let timer = self.clone();
                let logout = tokio::spawn(async move {
                    sleep_until(logout_at).await;
                    timer.fire_logout(epoch);
                });

                inner.timers = Some(TimerPair {
                    warning,
                    logout,
                    logout_at,
                });
                inner.state = IdleState::Active;
                (true, was_warning)
            }
        };

        if resumed {
            debug!("Activity dismissed idle warning");
            if let Some(observer) = self.observer.upgrade() {
                observer.idle_resumed();
            }
        }
        armed
    }

    /// Rearm on user activity. Cheap enough to call on every pointer move:
    /// the previous pair is aborted, never stacked.
    pub fn on_activity(&self) -> bool {
        self.arm()
    }

    /// Abort both timers and go inactive. Returns whether anything was scheduled.
    pub fn cancel(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.state = IdleState::Inactive;
        match inner.timers.take() {
            Some(pair) => {
                pair.abort();
                true
            }
            None => false,
        }
    }

    /// Claim a forced logout for `epoch`. Succeeds at most once per arm, and
    /// never after a rearm or cancel.
    pub fn expire(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.state == IdleState::Inactive {
            return false;
        }
        inner.epoch += 1;
        inner.state = IdleState::Inactive;
        if let Some(pair) = inner.timers.take() {
            pair.abort();
        }
        true
    }

    pub fn state(&self) -> IdleState {
        self.inner.lock().state
    }

    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.inner.lock().epoch == epoch
    }

    /// Scheduled timer tasks that have not finished yet (0..=2)
    pub fn live_timers(&self) -> usize {
        self.inner.lock().timers.as_ref().map_or(0, TimerPair::live)
    }

    pub fn logout_deadline(&self) -> Option<Instant> {
        self.inner.lock().timers.as_ref().map(|t| t.logout_at)
    }

    fn fire_warning(&self, epoch: u64, logout_at: Instant) {
        let fire = {
            let mut inner = self.inner.lock();
            if inner.epoch == epoch && inner.state == IdleState::Active {
                inner.state = IdleState::WarningShown;
                true
            } else {
                false
            }
        };

        if fire {
            info!(logout_in_secs = self.settings.warning_lead.as_secs(), "Showing idle warning");
            if let Some(observer) = self.observer.upgrade() {
                observer.idle_warning(epoch, logout_at);
            }
        }
    }

    fn fire_logout(&self, epoch: u64) {
        if !self.is_current(epoch) {
            return;
        }
        if let Some(observer) = self.observer.upgrade() {
            observer.idle_expired(epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, UserIdentity};
    use crate::session::Session;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stands in for the facade: clears the store when an expiry is claimed.
    #[derive(Default)]
    struct Recorder {
        timer: Mutex<Option<IdleTimer>>,
        store: Mutex<Option<SessionStore>>,
        warnings: AtomicUsize,
        resumed: AtomicUsize,
        expiries: AtomicUsize,
    }

    impl IdleObserver for Recorder {
        fn idle_warning(&self, _epoch: u64, _logout_at: Instant) {
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }

        fn idle_resumed(&self) {
            self.resumed.fetch_add(1, Ordering::SeqCst);
        }

        fn idle_expired(&self, epoch: u64) {
            let timer = self.timer.lock().clone();
            if let Some(timer) = timer {
                if timer.expire(epoch) {
                    self.expiries.fetch_add(1, Ordering::SeqCst);
                    if let Some(store) = self.store.lock().as_ref() {
                        store.clear();
                    }
                }
            }
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(30 * 60);
    const LEAD: Duration = Duration::from_secs(2 * 60);

    fn setup(signed_in: bool) -> (IdleTimer, SessionStore, Arc<Recorder>) {
        let store = SessionStore::new();
        if signed_in {
            store.set(Session::signed_in(UserIdentity::new("1", "a@b.com", Role::User)));
        }
        let recorder = Arc::new(Recorder::default());
        let observer: Weak<dyn IdleObserver> = Arc::downgrade(&recorder) as Weak<dyn IdleObserver>;
        let settings = IdleSettings::new(TIMEOUT, LEAD).expect("valid settings");
        let timer = IdleTimer::new(settings, store.clone(), observer);
        *recorder.timer.lock() = Some(timer.clone());
        *recorder.store.lock() = Some(store.clone());
        (timer, store, recorder)
    }

    /// Let woken timer tasks run to completion
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(d: Duration) {
        tokio::time::advance(d).await;
        settle().await;
    }

    #[test]
    fn test_settings_validation() {
        assert!(IdleSettings::new(TIMEOUT, LEAD).is_ok());
        assert_eq!(
            IdleSettings::new(Duration::ZERO, Duration::ZERO),
            Err(SettingsError::ZeroTimeout)
        );
        assert!(matches!(
            IdleSettings::new(LEAD, LEAD),
            Err(SettingsError::WarningNotBeforeTimeout { .. })
        ));

        let defaults = IdleSettings::default();
        assert_eq!(defaults.timeout(), DEFAULT_IDLE_TIMEOUT);
        assert_eq!(defaults.warning_after(), Duration::from_secs(28 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_without_session_is_noop() {
        let (timer, _store, _recorder) = setup(false);
        assert!(!timer.arm());
        assert_eq!(timer.state(), IdleState::Inactive);
        assert_eq!(timer.live_timers(), 0);
        assert!(timer.logout_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_fires_once_at_deadline() {
        let (timer, store, recorder) = setup(true);
        assert!(timer.arm());
        assert_eq!(timer.state(), IdleState::Active);
        assert_eq!(timer.live_timers(), 2);

        advance(TIMEOUT - LEAD - Duration::from_millis(1)).await;
        assert_eq!(timer.state(), IdleState::Active);
        assert_eq!(recorder.warnings.load(Ordering::SeqCst), 0);

        advance(Duration::from_millis(1)).await;
        assert_eq!(timer.state(), IdleState::WarningShown);
        assert_eq!(recorder.warnings.load(Ordering::SeqCst), 1);
        assert!(store.is_authenticated());
        // Warning task done, logout still pending
        assert_eq!(timer.live_timers(), 1);

        advance(LEAD - Duration::from_millis(1)).await;
        assert_eq!(recorder.warnings.load(Ordering::SeqCst), 1);
        assert!(store.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_fires_once_at_timeout() {
        let (timer, store, recorder) = setup(true);
        timer.arm();

        advance(TIMEOUT - LEAD).await;
        assert_eq!(recorder.expiries.load(Ordering::SeqCst), 0);
        advance(LEAD).await;
        assert_eq!(recorder.expiries.load(Ordering::SeqCst), 1);
        assert_eq!(timer.state(), IdleState::Inactive);
        assert!(!store.is_authenticated());
        assert_eq!(timer.live_timers(), 0);

        advance(TIMEOUT * 2).await;
        assert_eq!(recorder.expiries.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.warnings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_before_deadline_prevents_logout() {
        let (timer, store, recorder) = setup(true);
        timer.arm();

        for _ in 0..10 {
            advance(TIMEOUT - Duration::from_secs(1)).await;
            timer.on_activity();
        }

        assert!(store.is_authenticated());
        assert_eq!(recorder.expiries.load(Ordering::SeqCst), 0);
        // Each rearm landed after the warning deadline but before logout
        assert_eq!(recorder.warnings.load(Ordering::SeqCst), 10);
        assert_eq!(recorder.resumed.load(Ordering::SeqCst), 10);
        assert_eq!(timer.state(), IdleState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_activity_keeps_single_pair() {
        let (timer, _store, _recorder) = setup(true);
        let first_epoch = timer.epoch();
        for _ in 0..10_000 {
            timer.on_activity();
        }
        settle().await;
        assert_eq!(timer.live_timers(), 2);
        assert_eq!(timer.epoch(), first_epoch + 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_warning_resets_deadline() {
        let (timer, store, recorder) = setup(true);
        timer.arm();

        advance(TIMEOUT - LEAD).await;
        assert_eq!(timer.state(), IdleState::WarningShown);

        let stayed_at = Instant::now();
        assert!(timer.on_activity());
        assert_eq!(timer.state(), IdleState::Active);
        assert_eq!(recorder.resumed.load(Ordering::SeqCst), 1);
        assert_eq!(timer.logout_deadline(), Some(stayed_at + TIMEOUT));

        // The first deadline passes harmlessly
        advance(LEAD).await;
        assert!(store.is_authenticated());

        advance(TIMEOUT - LEAD).await;
        assert!(!store.is_authenticated());
        assert_eq!(recorder.expiries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_both_timers() {
        let (timer, store, recorder) = setup(true);
        timer.arm();
        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert_eq!(timer.live_timers(), 0);
        assert_eq!(timer.state(), IdleState::Inactive);

        advance(TIMEOUT * 2).await;
        assert_eq!(recorder.warnings.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.expiries.load(Ordering::SeqCst), 0);
        assert!(store.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_epoch_cannot_expire() {
        let (timer, _store, _recorder) = setup(true);
        timer.arm();
        let stale = timer.epoch();
        timer.on_activity();
        assert!(!timer.expire(stale));

        let current = timer.epoch();
        assert!(timer.expire(current));
        assert!(!timer.expire(current));
    }
}
