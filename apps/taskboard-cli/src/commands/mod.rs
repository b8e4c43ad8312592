//! CLI command implementations.

mod auth;
mod tasks;

pub use auth::{guard, login, logout, register, whoami};
pub use tasks::{add, delete, list, stats, toggle, update};

use crate::output::{self, OutputFormat};
use crate::shell::{Input, ShellCommand};
use anyhow::Result;
use taskboard_api::ApiResult;
use taskboard_session::{GuardDecision, GuardKind, SessionContext};
use tracing::debug;

/// Run one parsed shell command.
pub async fn execute(
    ctx: &SessionContext,
    input: &mut Input,
    command: ShellCommand,
    format: OutputFormat,
) -> Result<()> {
    match command {
        ShellCommand::Login { email } => login(ctx, input, email, format).await,
        ShellCommand::Register { email } => register(ctx, input, email, format).await,
        ShellCommand::Logout => logout(ctx, format).await,
        ShellCommand::Whoami => whoami(ctx, format),
        ShellCommand::List => list(ctx, format).await,
        ShellCommand::Add {
            title,
            priority,
            progress,
        } => add(ctx, &title.join(" "), priority, progress, format).await,
        ShellCommand::Update {
            id,
            title,
            priority,
            progress,
        } => update(ctx, id, title, priority, progress, format).await,
        ShellCommand::Done { id } => toggle(ctx, id, format).await,
        ShellCommand::Delete { id } => delete(ctx, id, format).await,
        ShellCommand::Stats => stats(ctx, format).await,
        ShellCommand::Guard => guard(ctx, format),
        ShellCommand::Quit => Ok(()),
    }
}

/// Consult a route guard; prints why when the command may not run.
fn allowed(ctx: &SessionContext, kind: GuardKind, format: OutputFormat) -> bool {
    match ctx.decide(kind) {
        GuardDecision::RenderChildren => true,
        GuardDecision::Loading => {
            output::print_error("Session is still loading. Try again in a moment.", format);
            false
        }
        GuardDecision::RedirectToLogin => {
            output::print_error("Not signed in. Use 'login' or 'register' first.", format);
            false
        }
        GuardDecision::RedirectToApp => {
            let email = ctx.store.user().map(|u| u.email).unwrap_or_default();
            output::print_error(
                &format!("Already signed in as {}. Use 'logout' first.", email),
                format,
            );
            false
        }
    }
}

/// Failures have already been shown as notices; only the value matters here.
fn reported<T>(result: ApiResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            debug!(kind = %error.kind(), "Command failed");
            None
        }
    }
}
