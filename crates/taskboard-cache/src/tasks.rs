//! Optimistic task mutations.
//!
//! Every write runs the same four phases against the task collection:
//! cancel the in-flight read, snapshot, apply the expected result, then
//! reconcile with the server. A failed write restores its own snapshot, so a
//! concurrent write to the same collection that is still pending can lose its
//! optimistic effect until the following revalidation lands.

use crate::client::{MutationOutcome, QueryClient, Snapshot};
use crate::resource::TaskList;
use chrono::Utc;
use taskboard_api::{
    ApiError, ApiResult, FieldErrors, LocalId, NewTask, Priority, Progress, Task, TaskId,
    TaskPatch,
};
use tracing::debug;

/// A change to the cached collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskChange {
    /// Add a task at the end.
    Append(Task),
    /// Merge fields into the task with this id.
    Patch { id: TaskId, patch: TaskPatch },
    /// Drop the task with this id.
    Remove(TaskId),
    /// Swap a placeholder for its server record, appending if the placeholder is gone.
    Confirm { pending: LocalId, task: Task },
    /// Replace the task with the same confirmed id, if present.
    Replace(Task),
}

/// Compute the collection after `change`. Pure; order is preserved.
pub fn apply_change(tasks: &[Task], change: &TaskChange) -> Vec<Task> {
    match change {
        TaskChange::Append(task) => {
            let mut next = tasks.to_vec();
            next.push(task.clone());
            next
        }
        TaskChange::Patch { id, patch } => {
            let now = Utc::now();
            tasks
                .iter()
                .cloned()
                .map(|mut task| {
                    if task.id == *id {
                        patch.apply_to(&mut task);
                        task.updated_at = now;
                    }
                    task
                })
                .collect()
        }
        TaskChange::Remove(id) => tasks.iter().filter(|t| t.id != *id).cloned().collect(),
        TaskChange::Confirm { pending, task } => {
            let pending = TaskId::Pending(*pending);
            let mut next = tasks.to_vec();
            if let Some(slot) = next.iter_mut().find(|t| t.id == pending) {
                *slot = task.clone();
            } else if !next.iter().any(|t| t.id == task.id) {
                next.push(task.clone());
            }
            next
        }
        TaskChange::Replace(task) => tasks
            .iter()
            .map(|t| if t.id == task.id { task.clone() } else { t.clone() })
            .collect(),
    }
}

/// Apply `change` to possibly-unloaded data. Only an append creates a collection.
fn apply_to_cached(current: Option<&Vec<Task>>, change: &TaskChange) -> Option<Vec<Task>> {
    match (current, change) {
        (Some(tasks), _) => Some(apply_change(tasks, change)),
        (None, TaskChange::Append(task)) => Some(vec![task.clone()]),
        (None, _) => None,
    }
}

fn placeholder(local: LocalId, input: &NewTask) -> Task {
    let now = Utc::now();
    Task {
        id: TaskId::Pending(local),
        title: input.title.clone(),
        priority: input.priority,
        progress: input.progress,
        owner: String::new(),
        created_at: now,
        updated_at: now,
    }
}

impl QueryClient {
    /// Phases 1 to 3 for the task collection: returns the rollback snapshot.
    fn begin_task_write(&self, change: &TaskChange) -> Snapshot<Vec<Task>> {
        self.cancel::<TaskList>();
        let snapshot = self.snapshot::<TaskList>();
        self.apply::<TaskList, _>(|current| apply_to_cached(current, change));
        debug!(?change, "Applied optimistic task change");
        snapshot
    }

    /// Reject invalid input before the cache or network is touched.
    fn check<T>(&self, input: ApiResult<T>) -> ApiResult<T> {
        input.inspect_err(|error| self.report(error))
    }

    /// Create a task. A `Pending` placeholder is visible until the server answers.
    pub async fn create_task(
        &self,
        title: &str,
        priority: Priority,
        progress: Progress,
    ) -> ApiResult<MutationOutcome<Task>> {
        let input = self.check(NewTask::new(title, priority, progress))?;
        let local = LocalId::new();
        let snapshot = self.begin_task_write(&TaskChange::Append(placeholder(local, &input)));

        let api = self.api().clone();
        self.reconcile::<TaskList, _, _, _>(snapshot, api.create_task(&input), |created, current| {
            apply_to_cached(
                current,
                &TaskChange::Confirm {
                    pending: local,
                    task: created.clone(),
                },
            )
        })
        .await
    }

    /// Apply a partial update to a confirmed task.
    pub async fn update_task(&self, id: i64, patch: TaskPatch) -> ApiResult<MutationOutcome<Task>> {
        let patch = self.check(patch.validated())?;
        let snapshot = self.begin_task_write(&TaskChange::Patch {
            id: TaskId::Confirmed(id),
            patch: patch.clone(),
        });

        let api = self.api().clone();
        self.reconcile::<TaskList, _, _, _>(snapshot, api.update_task(id, &patch), |updated, current| {
            apply_to_cached(current, &TaskChange::Replace(updated.clone()))
        })
        .await
    }

    /// Delete a confirmed task.
    pub async fn delete_task(&self, id: i64) -> ApiResult<MutationOutcome<()>> {
        let snapshot = self.begin_task_write(&TaskChange::Remove(TaskId::Confirmed(id)));

        let api = self.api().clone();
        self.reconcile::<TaskList, _, _, _>(snapshot, api.delete_task(id), |_, current| {
            current.cloned()
        })
        .await
    }

    /// Flip a cached task between complete (100) and not started (0).
    pub async fn toggle_complete(&self, id: i64) -> ApiResult<MutationOutcome<Task>> {
        let cached = self.state::<TaskList>().data.and_then(|tasks| {
            tasks
                .into_iter()
                .find(|t| t.id == TaskId::Confirmed(id))
        });
        let Some(task) = cached else {
            let error = ApiError::InvalidInput(FieldErrors::single(
                "id",
                format!("No task with id {id} in the current list."),
            ));
            self.report(&error);
            return Err(error);
        };

        let progress = if task.is_complete() {
            Progress::ZERO
        } else {
            Progress::COMPLETE
        };
        self.update_task(id, TaskPatch::progress(progress)).await
    }
}
