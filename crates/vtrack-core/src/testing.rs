//! Scripted `AuthBackend` for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::ApiError;
use crate::auth::{AuthBackend, Credentials, UserIdentity};

enum StatusScript {
    User(Option<UserIdentity>),
    Fail,
}

enum LoginScript {
    Accept(UserIdentity),
    Reject,
}

struct Script {
    status: StatusScript,
    status_delay: Option<Duration>,
    status_hangs: bool,
    login: LoginScript,
    logout_fails: bool,
    logout_delay: Option<Duration>,
}

pub(crate) struct ScriptedBackend {
    script: Mutex<Script>,
    status_calls: AtomicUsize,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                status: StatusScript::User(None),
                status_delay: None,
                status_hangs: false,
                login: LoginScript::Reject,
                logout_fails: false,
                logout_delay: None,
            }),
            status_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn set_status_user(&self, user: Option<UserIdentity>) {
        self.script.lock().status = StatusScript::User(user);
    }

    pub(crate) fn fail_status(&self) {
        self.script.lock().status = StatusScript::Fail;
    }

    pub(crate) fn delay_status(&self, delay: Duration) {
        self.script.lock().status_delay = Some(delay);
    }

    pub(crate) fn hang_status(&self) {
        self.script.lock().status_hangs = true;
    }

    pub(crate) fn accept_login(&self, user: UserIdentity) {
        self.script.lock().login = LoginScript::Accept(user);
    }

    pub(crate) fn reject_login(&self) {
        self.script.lock().login = LoginScript::Reject;
    }

    pub(crate) fn fail_logout(&self) {
        self.script.lock().logout_fails = true;
    }

    pub(crate) fn delay_logout(&self, delay: Duration) {
        self.script.lock().logout_delay = Some(delay);
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn session_status(&self) -> Result<Option<UserIdentity>, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, hangs) = {
            let script = self.script.lock();
            (script.status_delay, script.status_hangs)
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script.lock().status {
            StatusScript::User(user) => Ok(user.clone()),
            StatusScript::Fail => Err(ApiError::ServerError("scripted failure".to_string())),
        }
    }

    async fn login(&self, _credentials: &Credentials) -> Result<UserIdentity, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        match &self.script.lock().login {
            LoginScript::Accept(user) => Ok(user.clone()),
            LoginScript::Reject => Err(ApiError::Unauthorized),
        }
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, fails) = {
            let script = self.script.lock();
            (script.logout_delay, script.logout_fails)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            Err(ApiError::ServerError("scripted logout failure".to_string()))
        } else {
            Ok(())
        }
    }
}
