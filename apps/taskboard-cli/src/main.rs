//! Taskboard CLI - interactive shell for the Taskboard task tracker.

mod commands;
mod output;
mod shell;

use anyhow::Context;
use clap::Parser;
use output::{OutputFormat, StderrNotifier};
use std::sync::Arc;
use taskboard_api::{HttpOptions, HttpTaskApi, RetryPolicy};
use taskboard_config::{init_logging, ClientConfig, Paths};
use taskboard_session::{InitOutcome, SessionContext};
use tracing::info;

/// Taskboard CLI - manage your tasks from the terminal.
#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Interactive shell for the Taskboard task tracker")]
#[command(version)]
struct Cli {
    /// API root (overrides config and TASKBOARD_API_URL)
    #[arg(long, env = "TASKBOARD_API_URL")]
    api_url: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Mirror logs to stderr
    #[arg(short, long)]
    verbose: bool,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let mut config = ClientConfig::load(&paths).context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    config.validate()?;

    init_logging("cli", &config, &paths, cli.verbose);
    info!(api = %config.api_base_url, "Starting taskboard shell");

    let api = HttpTaskApi::new(
        config.api_base_url()?,
        HttpOptions {
            timeout: config.request_timeout(),
            retry: RetryPolicy {
                limit: config.read_retry_limit,
                ..Default::default()
            },
        },
    )?;
    let ctx = SessionContext::new(Arc::new(api), Arc::new(StderrNotifier::new(cli.format)));

    match ctx.initializer.initialize().await? {
        InitOutcome::Authenticated(user) => println!("Logged in as {}", user.email),
        InitOutcome::Anonymous => println!("Not logged in. Use 'login' or 'register'."),
        InitOutcome::InFlight | InitOutcome::AlreadySettled => {}
    }

    shell::run(&ctx, cli.format).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
