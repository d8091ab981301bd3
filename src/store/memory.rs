//! In-process backend. Tasks keep insertion order; each operation holds the
//! relevant mutex for its whole duration, so count-then-insert is atomic.

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccountStore, StoreError, TaskRepository};
use crate::{
    auth::{Account, Role, StoredCredentials},
    tasks::{Task, TaskDraft, TaskPatch},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: Mutex<Vec<StoredCredentials>>,
    tasks: Mutex<Vec<Task>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.iter().any(|stored| stored.account.username == username) {
            return Err(StoreError::Conflict("username already exists".to_string()));
        }

        let role = if accounts.is_empty() {
            Role::Admin
        } else {
            Role::User
        };
        let account = Account {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role,
        };
        accounts.push(StoredCredentials {
            account: account.clone(),
            password_hash: password_hash.to_string(),
        });
        Ok(account)
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, StoreError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .iter()
            .find(|stored| stored.account.username == username)
            .cloned())
    }

    async fn find_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .find_credentials(username)
            .await?
            .map(|stored| stored.account))
    }

    async fn promote_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let mut accounts = self.accounts.lock().await;
        Ok(accounts
            .iter_mut()
            .find(|stored| stored.account.username == username)
            .map(|stored| {
                stored.account.role = Role::Admin;
                stored.account.clone()
            }))
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.lock().await.clone())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let tasks = self.tasks.lock().await;
        Ok(tasks.iter().find(|task| task.id == id).cloned())
    }

    async fn insert_task(&self, draft: &TaskDraft) -> Result<Task, StoreError> {
        let task = Task {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            due_date: draft.due_date.clone(),
            status: draft.status.clone(),
        };
        self.tasks.lock().await.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> Result<Option<Task>, StoreError> {
        let mut tasks = self.tasks.lock().await;
        Ok(tasks.iter_mut().find(|task| task.id == id).map(|task| {
            patch.apply(task);
            task.clone()
        }))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        Ok(tasks.len() < before)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
