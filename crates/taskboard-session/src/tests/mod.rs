//! Scenario tests for the session layer against the in-memory API.
//!
//! - `boot.rs`  - one-shot probe, guard decisions while it runs
//! - `flows.rs` - sign-in, sign-out and failures during normal use


use crate::{GuardDecision, GuardKind, InitOutcome, RecordingNotifier, SessionContext};
use std::sync::Arc;
use taskboard_api::testing::ScriptedApi;
use taskboard_api::Credentials;

pub(crate) const EMAIL: &str = "a@b.com";
pub(crate) const PASSWORD: &str = "correct horse";

pub(crate) struct Harness {
    pub api: ScriptedApi,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: SessionContext,
}

pub(crate) fn harness(api: ScriptedApi) -> Harness {
    let notifier = Arc::new(RecordingNotifier::new());
    let ctx = SessionContext::new(Arc::new(api.clone()), notifier.clone());
    Harness { api, notifier, ctx }
}

/// Server with a live session cookie for [`EMAIL`].
pub(crate) fn signed_in() -> Harness {
    harness(ScriptedApi::new().with_session(EMAIL, PASSWORD))
}

/// Server that knows [`EMAIL`] but has no session.
pub(crate) fn signed_out() -> Harness {
    harness(ScriptedApi::new().with_account(EMAIL, PASSWORD))
}

/// Basic workflow: boot anonymous, sign in, see protected content, sign out.
#[tokio::test]
async fn basic_workflow() {
    let h = signed_out();

    let outcome = h.ctx.initializer.initialize().await.unwrap();
    assert_eq!(outcome, InitOutcome::Anonymous);
    assert_eq!(h.ctx.decide(GuardKind::Protected), GuardDecision::RedirectToLogin);
    assert_eq!(h.ctx.decide(GuardKind::Guest), GuardDecision::RenderChildren);

    let user = h
        .ctx
        .auth
        .sign_in(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();
    assert_eq!(user.email, EMAIL);
    assert_eq!(h.ctx.decide(GuardKind::Protected), GuardDecision::RenderChildren);

    h.ctx.auth.sign_out().await.unwrap();
    assert!(h.ctx.store.user().is_none());
    assert_eq!(h.ctx.decide(GuardKind::Protected), GuardDecision::RedirectToLogin);

    assert!(h.notifier.is_empty());
}
