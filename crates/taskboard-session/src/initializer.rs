//! Boot-time session probe.
//!
//! The probe runs through the cache's session slot, so its in-flight state is
//! the same one the guards read. The probe FSM and the store's `initialized`
//! flag together guarantee at most one boot probe per process.

use crate::error::{SessionError, SessionResult};
use crate::probe_fsm::{ProbeMachine, ProbeMachineInput, ProbeMachineState, ProbePhase};
use crate::store::SessionStore;
use parking_lot::Mutex;
use taskboard_api::{ApiResult, User};
use taskboard_cache::{QueryClient, SessionUser};
use tracing::{debug, info};

/// Result of [`SessionInitializer::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// The probe succeeded.
    Authenticated(User),
    /// The probe failed; the session is anonymous.
    Anonymous,
    /// Another caller is probing.
    InFlight,
    /// The session settled earlier in this process.
    AlreadySettled,
}

pub struct SessionInitializer {
    store: SessionStore,
    cache: QueryClient,
    fsm: Mutex<ProbeMachine>,
}

impl std::fmt::Debug for SessionInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInitializer")
            .field("phase", &self.phase())
            .finish()
    }
}

impl SessionInitializer {
    pub fn new(store: SessionStore, cache: QueryClient) -> Self {
        Self {
            store,
            cache,
            fsm: Mutex::new(ProbeMachine::new()),
        }
    }

    pub fn phase(&self) -> ProbePhase {
        ProbePhase::from(self.fsm.lock().state())
    }

    /// Whether a session probe is currently running.
    pub fn probe_in_flight(&self) -> bool {
        self.cache.is_fetching::<SessionUser>()
    }

    /// Probe the session once and settle the store.
    ///
    /// Success sets the user; any failure clears it. Either way `initialized`
    /// becomes true. Calls after the first return without probing.
    pub async fn initialize(&self) -> SessionResult<InitOutcome> {
        if let Some(outcome) = self.claim_probe()? {
            debug!(?outcome, "Skipping session probe");
            return Ok(outcome);
        }

        info!("Probing session");
        let probe = self.cache.query::<SessionUser>().await.into_result();
        match probe {
            Ok(user) => {
                self.store.set_user(user.clone());
                self.store.set_initialized(true);
                self.transition(&ProbeMachineInput::ProbeSucceeded)?;
                info!(user_id = user.id, "Session settled: authenticated");
                Ok(InitOutcome::Authenticated(user))
            }
            Err(error) => {
                self.store.logout();
                self.store.set_initialized(true);
                self.transition(&ProbeMachineInput::ProbeFailed)?;
                info!(kind = %error.kind(), "Session settled: anonymous");
                Ok(InitOutcome::Anonymous)
            }
        }
    }

    /// Move Unprobed to Probing, or report why no probe is needed.
    fn claim_probe(&self) -> SessionResult<Option<InitOutcome>> {
        let mut fsm = self.fsm.lock();
        match fsm.state() {
            ProbeMachineState::Probing => return Ok(Some(InitOutcome::InFlight)),
            ProbeMachineState::Settled => return Ok(Some(InitOutcome::AlreadySettled)),
            ProbeMachineState::Unprobed if self.store.is_initialized() => {
                return Ok(Some(InitOutcome::AlreadySettled))
            }
            ProbeMachineState::Unprobed => {}
        }
        fsm.consume(&ProbeMachineInput::ProbeStarted)
            .map_err(|_| invalid(&ProbeMachineInput::ProbeStarted, fsm.state()))?;
        debug!(old_phase = ?ProbePhase::Unprobed, new_phase = ?ProbePhase::Probing, "Probe phase transition");
        Ok(None)
    }

    fn transition(&self, input: &ProbeMachineInput) -> SessionResult<ProbePhase> {
        let mut fsm = self.fsm.lock();
        let old_phase = ProbePhase::from(fsm.state());
        fsm.consume(input).map_err(|_| invalid(input, fsm.state()))?;
        let new_phase = ProbePhase::from(fsm.state());
        drop(fsm);

        if old_phase != new_phase {
            debug!(?old_phase, ?new_phase, "Probe phase transition");
        }
        Ok(new_phase)
    }

    /// Force a fresh probe, e.g. after sign-in for cache warming.
    ///
    /// Does not reopen the boot sequence. Failures are dispatched by the cache.
    pub async fn refetch(&self) -> ApiResult<User> {
        let user = self.cache.refetch::<SessionUser>().await.into_result()?;
        self.store.set_user(user.clone());
        Ok(user)
    }
}

fn invalid(input: &ProbeMachineInput, state: &ProbeMachineState) -> SessionError {
    SessionError::InvalidStateTransition(format!("Cannot apply {input:?} in state {state:?}"))
}
