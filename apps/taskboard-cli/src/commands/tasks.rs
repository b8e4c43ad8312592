//! Task commands.

use super::{allowed, reported};
use crate::output::{self, OutputFormat, StatsView, TaskRow, TaskTable};
use anyhow::Result;
use taskboard_api::{Priority, Progress, TaskPatch};
use taskboard_cache::{ProgressStats, TaskList, TaskStats};
use taskboard_session::{GuardKind, SessionContext};

/// List tasks.
pub async fn list(ctx: &SessionContext, format: OutputFormat) -> Result<()> {
    if !allowed(ctx, GuardKind::Protected, format) {
        return Ok(());
    }
    if let Some(tasks) = reported(ctx.cache.query::<TaskList>().await.into_result()) {
        output::print(&TaskTable(tasks.iter().map(TaskRow::from).collect()), format);
    }
    Ok(())
}

/// Add a task.
pub async fn add(
    ctx: &SessionContext,
    title: &str,
    priority: Priority,
    progress: Progress,
    format: OutputFormat,
) -> Result<()> {
    if !allowed(ctx, GuardKind::Protected, format) {
        return Ok(());
    }
    if let Some(outcome) = reported(ctx.cache.create_task(title, priority, progress).await) {
        outcome.revalidation.wait().await;
        let task = outcome.value;
        output::print_success(&format!("Added #{} {}", task.id, task.title), format);
    }
    Ok(())
}

/// Change fields of a task.
pub async fn update(
    ctx: &SessionContext,
    id: i64,
    title: Option<String>,
    priority: Option<Priority>,
    progress: Option<Progress>,
    format: OutputFormat,
) -> Result<()> {
    if !allowed(ctx, GuardKind::Protected, format) {
        return Ok(());
    }
    let patch = TaskPatch {
        title,
        priority,
        progress,
    };
    if let Some(outcome) = reported(ctx.cache.update_task(id, patch).await) {
        outcome.revalidation.wait().await;
        output::print_success(&format!("Updated #{}", id), format);
    }
    Ok(())
}

/// Toggle a task between complete and not started.
pub async fn toggle(ctx: &SessionContext, id: i64, format: OutputFormat) -> Result<()> {
    if !allowed(ctx, GuardKind::Protected, format) {
        return Ok(());
    }
    // Toggling reads the cached task, so make sure the list is loaded.
    if reported(ctx.cache.query::<TaskList>().await.into_result()).is_none() {
        return Ok(());
    }
    if let Some(outcome) = reported(ctx.cache.toggle_complete(id).await) {
        outcome.revalidation.wait().await;
        let state = if outcome.value.is_complete() {
            "complete"
        } else {
            "not started"
        };
        output::print_success(&format!("Marked #{} {}", id, state), format);
    }
    Ok(())
}

/// Delete a task.
pub async fn delete(ctx: &SessionContext, id: i64, format: OutputFormat) -> Result<()> {
    if !allowed(ctx, GuardKind::Protected, format) {
        return Ok(());
    }
    if let Some(outcome) = reported(ctx.cache.delete_task(id).await) {
        outcome.revalidation.wait().await;
        output::print_success(&format!("Deleted #{}", id), format);
    }
    Ok(())
}

/// Show both aggregate views.
pub async fn stats(ctx: &SessionContext, format: OutputFormat) -> Result<()> {
    if !allowed(ctx, GuardKind::Protected, format) {
        return Ok(());
    }
    let (by_priority, by_progress) = tokio::join!(
        ctx.cache.query::<TaskStats>(),
        ctx.cache.query::<ProgressStats>()
    );
    let (Some(by_priority), Some(histogram)) = (
        reported(by_priority.into_result()),
        reported(by_progress.into_result()),
    ) else {
        return Ok(());
    };
    output::print(&StatsView::new(&by_priority, &histogram.buckets()), format);
    Ok(())
}
