//! Shared client state.

use crate::auth::AuthFlows;
use crate::dispatcher::{ErrorDispatcher, Notifier};
use crate::guards::{decide, GuardDecision, GuardInput, GuardKind};
use crate::initializer::SessionInitializer;
use crate::store::SessionStore;
use std::sync::Arc;
use taskboard_api::TaskApi;
use taskboard_cache::{QueryClient, SessionUser};

/// Everything a front end needs, wired once at startup (thread-safe).
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// Current user and the `initialized` flag.
    pub store: SessionStore,
    /// Query cache; its failure sink is `dispatcher`.
    pub cache: QueryClient,
    /// Single place failures are turned into logout or a notice.
    pub dispatcher: ErrorDispatcher,
    /// One-shot boot probe.
    pub initializer: Arc<SessionInitializer>,
    pub auth: AuthFlows,
}

impl SessionContext {
    pub fn new(api: Arc<dyn TaskApi>, notifier: Arc<dyn Notifier>) -> Self {
        let store = SessionStore::new();
        let dispatcher = ErrorDispatcher::new(store.clone(), notifier);
        let cache = QueryClient::new(api, Arc::new(dispatcher.clone()));
        let initializer = Arc::new(SessionInitializer::new(store.clone(), cache.clone()));
        let auth = AuthFlows::new(store.clone(), cache.clone(), dispatcher.clone());
        Self {
            store,
            cache,
            dispatcher,
            initializer,
            auth,
        }
    }

    /// Inputs the guards see right now.
    pub fn guard_input(&self) -> GuardInput {
        GuardInput {
            initialized: self.store.is_initialized(),
            user_present: self.store.user().is_some(),
            probe_in_flight: self.cache.is_fetching::<SessionUser>(),
        }
    }

    pub fn decide(&self, kind: GuardKind) -> GuardDecision {
        decide(kind, self.guard_input())
    }
}
