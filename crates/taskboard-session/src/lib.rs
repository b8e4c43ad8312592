//! # Taskboard session
//!
//! Who is signed in, and what the client does about it.
//!
//! - [`SessionStore`] holds the current user and the `initialized` flag
//! - [`SessionInitializer`] probes the server once per process
//! - [`guards`] decide between loading, rendering and redirecting
//! - [`ErrorDispatcher`] is the single sink for failures: a 401 logs out,
//!   anything else becomes one [`Notice`]
//! - [`AuthFlows`] signs in, signs up and signs out
//!
//! [`SessionContext`] wires all of them around one [`taskboard_cache::QueryClient`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskboard_api::{HttpOptions, HttpTaskApi};
//! use taskboard_session::{GuardKind, RecordingNotifier, SessionContext};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpTaskApi::new("http://localhost:8000/api/v1/".parse()?, HttpOptions::default())?;
//! let ctx = SessionContext::new(Arc::new(api), Arc::new(RecordingNotifier::new()));
//!
//! ctx.initializer.initialize().await?;
//! println!("{:?}", ctx.decide(GuardKind::Protected));
//! # Ok(())
//! # }
//! ```

mod auth;
mod context;
mod dispatcher;
mod error;
pub mod guards;
mod initializer;
mod probe_fsm;
mod store;

#[cfg(test)]
mod tests;

pub use auth::AuthFlows;
pub use context::SessionContext;
pub use dispatcher::{
    classify, Classification, ErrorDispatcher, Notice, NoticeKind, Notifier, RecordingNotifier,
};
pub use error::{SessionError, SessionResult};
pub use guards::{GuardDecision, GuardInput, GuardKind};
pub use initializer::{InitOutcome, SessionInitializer};
pub use probe_fsm::{ProbeMachine, ProbeMachineInput, ProbeMachineState, ProbePhase};
pub use store::{Session, SessionStore, Subscription};
