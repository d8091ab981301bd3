//! Storage backends for accounts and tasks.
//!
//! Two implementations share the same traits:
//! - `postgres`: `sqlx` over a `PgPool`, schema applied at startup.
//! - `memory`: mutex-guarded vectors, for local runs and tests.
//!
//! The DSN scheme picks the backend (`postgres://` or `memory://`).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::{
    auth::{Account, StoredCredentials},
    tasks::{Task, TaskDraft, TaskPatch},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid row: {0}")]
    InvalidRow(String),
    #[error("store operation timed out")]
    Timeout,
}

/// Account persistence.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert an account, assigning `admin` if and only if no account existed
    /// before this insert. Counting and inserting happen as one atomic step.
    ///
    /// Returns `StoreError::Conflict` when the username is taken.
    async fn insert_account(&self, username: &str, password_hash: &str)
        -> Result<Account, StoreError>;

    async fn find_credentials(&self, username: &str)
        -> Result<Option<StoredCredentials>, StoreError>;

    async fn find_account(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Set the role to `admin`; `None` when the username does not exist.
    async fn promote_account(&self, username: &str) -> Result<Option<Account>, StoreError>;
}

/// Task persistence. Identifiers are assigned by the implementation.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// All tasks in creation order.
    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    async fn insert_task(&self, draft: &TaskDraft) -> Result<Task, StoreError>;

    /// Merge the fields present in `patch`; `None` when no task has `id`.
    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> Result<Option<Task>, StoreError>;

    /// `true` when a task was removed.
    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Store handles shared by the services.
#[derive(Clone)]
pub struct Backend {
    pub accounts: Arc<dyn AccountStore>,
    pub tasks: Arc<dyn TaskRepository>,
}

impl Backend {
    #[must_use]
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            accounts: store.clone(),
            tasks: store,
        }
    }

    #[must_use]
    pub fn postgres(store: PostgresStore) -> Self {
        let store = Arc::new(store);
        Self {
            accounts: store.clone(),
            tasks: store,
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

/// Open the backend named by `dsn`.
///
/// # Errors
/// Returns an error if the DSN is not a URL, names an unsupported scheme, or the
/// database cannot be reached or migrated.
pub async fn connect(dsn: &str) -> Result<Backend> {
    let url = Url::parse(dsn).context("Invalid DSN")?;
    match url.scheme() {
        "memory" => Ok(Backend::memory()),
        "postgres" | "postgresql" => {
            let store = PostgresStore::connect(dsn).await?;
            store.migrate().await?;
            Ok(Backend::postgres(store))
        }
        other => Err(anyhow!("Unsupported DSN scheme: {other}")),
    }
}

/// Bound a single store call; elapsing yields `StoreError::Timeout`.
pub(crate) async fn with_deadline<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_memory_backend() -> anyhow::Result<()> {
        let backend = connect("memory://").await?;
        assert!(backend.tasks.list_tasks().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn connect_rejects_unknown_scheme() {
        let result = connect("mysql://localhost/tasks").await;
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("Unsupported DSN scheme"));
        }
    }

    #[tokio::test]
    async fn connect_rejects_garbage() {
        assert!(connect("not a url").await.is_err());
    }

    #[tokio::test]
    async fn deadline_elapses_as_timeout() {
        let result: Result<(), StoreError> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn deadline_passes_results_through() {
        let result = with_deadline(Duration::from_secs(1), async { Ok(7) }).await;
        assert!(matches!(result, Ok(7)));
    }
}
