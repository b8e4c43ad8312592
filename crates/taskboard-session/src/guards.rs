//! Route guards: pure decisions over session state.
//!
//! Neither guard redirects while the boot probe is unsettled
//! (`probe_in_flight && !initialized`); that state is always
//! [`GuardDecision::Loading`]. Redirects also require `initialized`.

/// What a guard looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardInput {
    pub initialized: bool,
    pub user_present: bool,
    pub probe_in_flight: bool,
}

/// Render branch chosen by a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Loading,
    RenderChildren,
    RedirectToLogin,
    RedirectToApp,
}

impl GuardDecision {
    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            GuardDecision::RedirectToLogin | GuardDecision::RedirectToApp
        )
    }
}

/// Guard flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    /// Pages that need a signed-in user.
    Protected,
    /// Pages for signed-out visitors only (login, register).
    Guest,
}

impl GuardInput {
    /// The boot probe is running and nothing has settled yet.
    pub fn is_unsettled(&self) -> bool {
        self.probe_in_flight && !self.initialized
    }

    /// The session state can be trusted for a redirect.
    fn is_settled_idle(&self) -> bool {
        self.initialized && !self.probe_in_flight
    }
}

pub fn protected(input: GuardInput) -> GuardDecision {
    if input.is_unsettled() {
        return GuardDecision::Loading;
    }
    if input.is_settled_idle() && !input.user_present {
        return GuardDecision::RedirectToLogin;
    }
    GuardDecision::RenderChildren
}

pub fn guest(input: GuardInput) -> GuardDecision {
    if input.is_unsettled() {
        return GuardDecision::Loading;
    }
    if input.is_settled_idle() && input.user_present {
        return GuardDecision::RedirectToApp;
    }
    GuardDecision::RenderChildren
}

pub fn decide(kind: GuardKind, input: GuardInput) -> GuardDecision {
    match kind {
        GuardKind::Protected => protected(input),
        GuardKind::Guest => guest(input),
    }
}
