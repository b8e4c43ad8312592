//! Session store: the single owner of `{ user, initialized }`.
//!
//! Every write goes through a setter and notifies subscribers synchronously,
//! in registration order, after the state lock has been released. Listeners
//! may therefore read the store from inside a notification.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use taskboard_api::User;
use tracing::{debug, warn};

/// Snapshot of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    /// Flips to true once per process and never back.
    pub initialized: bool,
}

type Listener = Arc<dyn Fn(&Session) + Send + Sync>;

#[derive(Default)]
struct Inner {
    state: Mutex<Session>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    revision: AtomicU64,
}

/// Injected session state container. Clones share state.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "the listener is removed when the subscription is dropped"]
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.inner.state.lock())
            .field("revision", &self.revision())
            .finish()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Session {
        self.inner.state.lock().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.lock().user.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.lock().initialized
    }

    /// Number of writes so far.
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    /// Register `listener`; it is called after every write.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Replace the user.
    pub fn set_user(&self, user: User) {
        debug!(user_id = user.id, "Session user set");
        self.write(|session| {
            session.user = Some(user);
            true
        });
    }

    /// Clear the user. Returns false, without writing or notifying, when
    /// there was no user.
    pub fn logout(&self) -> bool {
        let changed = self.write(|session| session.user.take().is_some());
        if changed {
            debug!("Session user cleared");
        }
        changed
    }

    /// Set the initialized flag. The flag is monotonic: clearing it once set
    /// is ignored. Returns whether anything changed.
    pub fn set_initialized(&self, initialized: bool) -> bool {
        self.write(|session| {
            if session.initialized == initialized {
                return false;
            }
            if session.initialized {
                warn!("Ignoring attempt to reset initialized flag");
                return false;
            }
            session.initialized = true;
            true
        })
    }

    /// Apply `update`; when it reports a change, bump the revision and notify.
    fn write(&self, update: impl FnOnce(&mut Session) -> bool) -> bool {
        let snapshot = {
            let mut state = self.inner.state.lock();
            if !update(&mut state) {
                return false;
            }
            self.inner.revision.fetch_add(1, Ordering::SeqCst);
            state.clone()
        };

        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
        true
    }
}
