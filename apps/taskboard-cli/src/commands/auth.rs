//! Authentication commands.

use super::{allowed, reported};
use crate::output::{self, OutputFormat, UserView};
use crate::shell::{prompt, Input};
use anyhow::Result;
use taskboard_api::{ApiError, ApiResult, Credentials, FieldErrors};
use taskboard_session::{GuardKind, SessionContext};

async fn read_email(input: &mut Input, given: Option<String>) -> Result<Option<String>> {
    if let Some(email) = given {
        return Ok(Some(email));
    }
    Ok(prompt(input, "Email: ")
        .await?
        .map(|line| line.trim().to_string()))
}

/// Login with email and password.
pub async fn login(
    ctx: &SessionContext,
    input: &mut Input,
    email: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    if !allowed(ctx, GuardKind::Guest, format) {
        return Ok(());
    }
    let Some(email) = read_email(input, email).await? else {
        return Ok(());
    };

    // Prompt for password (hidden)
    let password = rpassword::prompt_password("Password: ")?;

    if let Some(user) = reported(ctx.auth.sign_in(&Credentials::new(email, password)).await) {
        output::print_success(&format!("Logged in as {}", user.email), format);
    }
    Ok(())
}

fn confirm_password(password: &str, confirmation: &str) -> ApiResult<()> {
    if password == confirmation {
        return Ok(());
    }
    Err(ApiError::InvalidInput(FieldErrors::single(
        "password2",
        "Passwords do not match.",
    )))
}

/// Create an account and sign in.
pub async fn register(
    ctx: &SessionContext,
    input: &mut Input,
    email: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    if !allowed(ctx, GuardKind::Guest, format) {
        return Ok(());
    }
    let Some(email) = read_email(input, email).await? else {
        return Ok(());
    };

    let password = rpassword::prompt_password("Password: ")?;
    let confirmation = rpassword::prompt_password("Confirm password: ")?;
    if let Err(error) = confirm_password(&password, &confirmation) {
        ctx.dispatcher.dispatch(&error);
        return Ok(());
    }

    if let Some(user) = reported(ctx.auth.sign_up(&Credentials::new(email, password)).await) {
        output::print_success(&format!("Registered and logged in as {}", user.email), format);
    }
    Ok(())
}

/// Logout and clear cached data.
pub async fn logout(ctx: &SessionContext, format: OutputFormat) -> Result<()> {
    if !ctx.store.is_authenticated() {
        output::print_success("Not logged in", format);
        return Ok(());
    }

    match ctx.auth.sign_out().await {
        Ok(()) => output::print_success("Logged out successfully", format),
        // The failure notice is already out; local state is gone regardless.
        Err(_) => output::print_success("Local session cleared", format),
    }
    Ok(())
}

/// Show the signed-in user.
pub fn whoami(ctx: &SessionContext, format: OutputFormat) -> Result<()> {
    if !allowed(ctx, GuardKind::Protected, format) {
        return Ok(());
    }
    if let Some(user) = ctx.store.user() {
        output::print(&UserView::from(&user), format);
    }
    Ok(())
}

/// Show guard inputs and decisions.
pub fn guard(ctx: &SessionContext, format: OutputFormat) -> Result<()> {
    let input = ctx.guard_input();
    let protected = ctx.decide(GuardKind::Protected);
    let guest = ctx.decide(GuardKind::Guest);

    match format {
        OutputFormat::Text => {
            output::print_heading("Session");
            output::print_row("Initialized", &input.initialized.to_string());
            output::print_row("User present", &input.user_present.to_string());
            output::print_row("Probe in flight", &input.probe_in_flight.to_string());
            output::print_row("Probe phase", &format!("{:?}", ctx.initializer.phase()));
            output::print_heading("Guards");
            output::print_row("Protected", &format!("{:?}", protected));
            output::print_row("Guest", &format!("{:?}", guest));
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "initialized": input.initialized,
                "user_present": input.user_present,
                "probe_in_flight": input.probe_in_flight,
                "probe_phase": format!("{:?}", ctx.initializer.phase()),
                "protected": format!("{:?}", protected),
                "guest": format!("{:?}", guest),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}
