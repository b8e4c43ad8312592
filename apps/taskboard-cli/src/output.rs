//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use taskboard_api::{PriorityCount, ProgressBucket, Task, User};
use taskboard_session::{Notice, NoticeKind, Notifier};

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print output in the specified format.
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", value),
        },
    }
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "status": "success", "message": message }));
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "status": "error", "message": message }));
        }
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", label), value);
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "-".repeat(50));
}

/// Print a heading.
pub fn print_heading(text: &str) {
    println!("\n{}", text);
    print_divider();
}

/// Writes session notices to stderr as they happen.
pub struct StderrNotifier {
    format: OutputFormat,
}

impl StderrNotifier {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        match (self.format, notice.kind) {
            (OutputFormat::Text, NoticeKind::SessionExpired) => eprintln!("! {}", notice),
            _ => print_error(&notice.message, self.format),
        }
    }
}

#[derive(Serialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub is_staff: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        let name = format!("{} {}", user.first_name, user.last_name)
            .trim()
            .to_string();
        Self {
            id: user.id,
            email: user.email.clone(),
            name,
            is_staff: user.is_staff,
        }
    }
}

impl fmt::Display for UserView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {})", self.email, self.id)?;
        if !self.name.is_empty() {
            write!(f, " - {}", self.name)?;
        }
        if self.is_staff {
            f.write_str(" [staff]")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct TaskRow {
    pub id: String,
    pub pending: bool,
    pub title: String,
    pub priority: String,
    pub progress: u8,
    pub complete: bool,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            pending: task.id.is_pending(),
            title: task.title.clone(),
            priority: task.priority.to_string(),
            progress: task.progress.value(),
            complete: task.is_complete(),
        }
    }
}

impl fmt::Display for TaskRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.complete { "x" } else { " " };
        let id = if self.pending { "…" } else { self.id.as_str() };
        write!(
            f,
            "  [{}] {:>5}  {:<6}  {:>4}%  {}",
            mark, id, self.priority, self.progress, self.title
        )
    }
}

/// Task listing.
#[derive(Serialize)]
#[serde(transparent)]
pub struct TaskTable(pub Vec<TaskRow>);

impl fmt::Display for TaskTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("No tasks yet.");
        }
        let done = self.0.iter().filter(|row| row.complete).count();
        writeln!(f, "{} tasks, {} complete", self.0.len(), done)?;
        for (i, row) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", row)?;
        }
        Ok(())
    }
}

/// Both aggregate views side by side.
#[derive(Serialize)]
pub struct StatsView {
    pub by_priority: Vec<(String, u64)>,
    pub by_progress: Vec<(String, u64)>,
}

impl StatsView {
    pub fn new(by_priority: &[PriorityCount], buckets: &[ProgressBucket]) -> Self {
        Self {
            by_priority: by_priority
                .iter()
                .map(|c| (c.priority.to_string(), c.count))
                .collect(),
            by_progress: buckets
                .iter()
                .map(|b| (b.label.to_string(), b.count))
                .collect(),
        }
    }
}

impl fmt::Display for StatsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "By priority:")?;
        if self.by_priority.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (priority, count) in &self.by_priority {
            writeln!(f, "  {:<8} {}", priority, count)?;
        }
        write!(f, "By progress:")?;
        for (label, count) in &self.by_progress {
            write!(f, "\n  {:<8} {} {}", label, "#".repeat(*count as usize), count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use taskboard_api::{LocalId, Priority, Progress, ProgressHistogram, TaskId};

    fn task(id: TaskId, progress: u8) -> Task {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Task {
            id,
            title: "Write report".to_string(),
            priority: Priority::High,
            progress: Progress::try_from(i64::from(progress)).unwrap(),
            owner: "a@b.com".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_task_row_text() {
        let row = TaskRow::from(&task(TaskId::Confirmed(7), 100));
        assert_eq!(row.to_string(), "  [x]     7  HIGH     100%  Write report");
    }

    #[test]
    fn test_pending_row_hides_local_id() {
        let row = TaskRow::from(&task(TaskId::Pending(LocalId::new()), 0));
        assert!(row.pending);
        assert!(row.to_string().contains("…"));
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(TaskTable(Vec::new()).to_string(), "No tasks yet.");
    }

    #[test]
    fn test_stats_view_keeps_bucket_order() {
        let histogram = ProgressHistogram {
            range_0_20: 2,
            range_81_100: 1,
            ..Default::default()
        };
        let view = StatsView::new(&[], &histogram.buckets());
        let labels: Vec<_> = view.by_progress.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, ["0-20%", "21-40%", "41-60%", "61-80%", "81-100%"]);
        assert!(view.to_string().contains("(none)"));
    }

    #[test]
    fn test_user_view_name() {
        let user = User {
            id: 3,
            email: "a@b.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: String::new(),
            is_staff: true,
        };
        assert_eq!(UserView::from(&user).to_string(), "a@b.com (id 3) - Ada [staff]");
    }
}
