//! Sign-in, sign-up and sign-out.

use crate::dispatcher::ErrorDispatcher;
use crate::store::SessionStore;
use taskboard_api::{ApiResult, AuthResponse, Credentials, User};
use taskboard_cache::{QueryClient, QueryKey, SessionUser};
use tracing::{info, warn};

/// User-initiated session transitions.
#[derive(Debug, Clone)]
pub struct AuthFlows {
    store: SessionStore,
    cache: QueryClient,
    dispatcher: ErrorDispatcher,
}

impl AuthFlows {
    pub fn new(store: SessionStore, cache: QueryClient, dispatcher: ErrorDispatcher) -> Self {
        Self {
            store,
            cache,
            dispatcher,
        }
    }

    /// Sign in. The user is in the store when this returns; the session key
    /// revalidates in the background.
    pub async fn sign_in(&self, credentials: &Credentials) -> ApiResult<User> {
        self.authenticate(credentials, false).await
    }

    /// Register and sign in.
    pub async fn sign_up(&self, credentials: &Credentials) -> ApiResult<User> {
        self.authenticate(credentials, true).await
    }

    async fn authenticate(&self, credentials: &Credentials, register: bool) -> ApiResult<User> {
        credentials
            .validate()
            .inspect_err(|error| self.dispatcher.dispatch(error))?;

        let api = self.cache.api();
        let response = if register {
            api.sign_up(credentials).await
        } else {
            api.sign_in(credentials).await
        }
        .inspect_err(|error| self.dispatcher.dispatch(error))?;

        let user = self.adopt(response).await?;
        info!(user_id = user.id, register, "Signed in");
        Ok(user)
    }

    /// Install the user from an auth response, probing when the response has none.
    async fn adopt(&self, response: AuthResponse) -> ApiResult<User> {
        let user = match response.user {
            Some(user) => {
                self.cache.set_data::<SessionUser>(user.clone());
                drop(self.cache.invalidate(&QueryKey::Session));
                user
            }
            None => self.cache.refetch::<SessionUser>().await.into_result()?,
        };
        self.store.set_user(user.clone());
        self.store.set_initialized(true);
        Ok(user)
    }

    /// Sign out. Local state is cleared whether or not the server call succeeds.
    pub async fn sign_out(&self) -> ApiResult<()> {
        let result = self.cache.api().sign_out().await;
        self.cache.clear();
        self.store.logout();

        match result {
            Ok(()) => {
                info!("Signed out");
                Ok(())
            }
            Err(error) => {
                warn!(kind = %error.kind(), "Sign-out failed on the server; local session cleared");
                self.dispatcher.dispatch(&error);
                Err(error)
            }
        }
    }
}
