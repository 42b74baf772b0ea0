use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::auth::UserIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user: UserIdentity,
    pub started_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(user: UserIdentity) -> Self {
        Self {
            user,
            started_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.started_at
    }
}

/// The client's view of "who is signed in". Either fully populated or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub data: Option<SessionData>,
}

impl Session {
    pub fn signed_in(user: UserIdentity) -> Self {
        Self {
            data: Some(SessionData::new(user)),
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.data.as_ref().map(|d| &d.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.data.is_some()
    }
}

/// Single source of truth for the current `Session`.
///
/// Backed by a `watch` channel: a `set` replaces the value in one step and
/// every subscriber is marked changed before `set` returns. Clones share the
/// same store.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::absent());
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Replace the session, returning the previous one.
    pub fn set(&self, session: Session) -> Session {
        self.tx.send_replace(session)
    }

    /// Clear the session. Returns false (and notifies nobody) if it was
    /// already absent.
    pub fn clear(&self) -> bool {
        self.tx.send_if_modified(|session| {
            if session.is_authenticated() {
                session.data = None;
                true
            } else {
                false
            }
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.tx.borrow().user().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn user() -> UserIdentity {
        UserIdentity::new("1", "a@b.com", Role::User)
    }

    #[test]
    fn test_set_and_get() {
        let store = SessionStore::new();
        assert!(!store.is_authenticated());

        let previous = store.set(Session::signed_in(user()));
        assert!(!previous.is_authenticated());
        assert!(store.is_authenticated());
        assert_eq!(store.user().map(|u| u.email), Some("a@b.com".to_string()));

        // Clones see the same value
        let other = store.clone();
        assert!(other.is_authenticated());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        assert!(!store.clear());
        assert!(!rx.has_changed().expect("store alive"));

        store.set(Session::signed_in(user()));
        assert!(rx.has_changed().expect("store alive"));
        rx.borrow_and_update();

        assert!(store.clear());
        assert!(rx.has_changed().expect("store alive"));
        assert!(!rx.borrow_and_update().is_authenticated());

        assert!(!store.clear());
        assert!(!rx.has_changed().expect("store alive"));
    }

    #[test]
    fn test_subscriber_sees_whole_value() {
        let store = SessionStore::new();
        let rx = store.subscribe();
        store.set(Session::signed_in(user()));

        let seen = rx.borrow().clone();
        let data = seen.data.expect("populated");
        assert_eq!(data.user, user());
        assert!(data.age() >= Duration::zero());
    }
}
