//! Task operations with identifier validation and partial-update merge.
//!
//! Every repository call runs under the per-call deadline; an elapsed
//! deadline surfaces as `Error::Internal`.

use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::model::{non_empty, Task, TaskDraft, TaskInput, TaskPatch};
use crate::{
    error::{Error, Result},
    store::{with_deadline, TaskRepository, DEFAULT_STORE_TIMEOUT},
};

pub const NO_FIELDS_TO_UPDATE: &str = "no fields to update";

pub struct TaskStore {
    repository: Arc<dyn TaskRepository>,
    timeout: Duration,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Parse a task identifier.
///
/// # Errors
/// Returns `Error::Validation` if `id` is not a UUID.
pub fn parse_task_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).map_err(|_| Error::validation("invalid task ID"))
}

impl TaskStore {
    #[must_use]
    pub fn new(repository: Arc<dyn TaskRepository>) -> Self {
        Self {
            repository,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// All tasks in creation order; an empty store yields an empty list.
    ///
    /// # Errors
    /// Returns `Error::Internal` on storage failure.
    pub async fn get_all(&self) -> Result<Vec<Task>> {
        Ok(with_deadline(self.timeout, self.repository.list_tasks()).await?)
    }

    /// # Errors
    /// Returns `Error::Validation` for a malformed id, `Error::Internal` on storage failure.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Task>> {
        let id = parse_task_id(id)?;
        Ok(with_deadline(self.timeout, self.repository.get_task(id)).await?)
    }

    /// Create a task; the store assigns the id.
    ///
    /// # Errors
    /// Returns `Error::Validation` when the title is missing or empty.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: TaskInput) -> Result<Task> {
        let Some(title) = non_empty(input.title) else {
            return Err(Error::validation("title required"));
        };
        let draft = TaskDraft {
            title,
            description: non_empty(input.description),
            due_date: non_empty(input.due_date),
            status: non_empty(input.status),
        };
        let task = with_deadline(self.timeout, self.repository.insert_task(&draft)).await?;
        debug!(task_id = %task.id, "task created");
        Ok(task)
    }

    /// Merge the non-empty fields of `input` into the task `id`.
    ///
    /// Returns `Ok(None)` when no task has that id.
    ///
    /// # Errors
    /// Returns `Error::Validation` for a malformed id or when no field is supplied.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: TaskInput) -> Result<Option<Task>> {
        let id = parse_task_id(id)?;
        let patch = TaskPatch::from_input(input);
        if patch.is_empty() {
            return Err(Error::validation(NO_FIELDS_TO_UPDATE));
        }
        Ok(with_deadline(self.timeout, self.repository.update_task(id, &patch)).await?)
    }

    /// Returns `false` when nothing matched `id`.
    ///
    /// # Errors
    /// Returns `Error::Validation` for a malformed id.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = parse_task_id(id)?;
        Ok(with_deadline(self.timeout, self.repository.delete_task(id)).await?)
    }

    /// # Errors
    /// Returns `Error::Internal` when the backing store is unreachable.
    pub async fn ping(&self) -> Result<()> {
        Ok(with_deadline(self.timeout, self.repository.ping()).await?)
    }
}
