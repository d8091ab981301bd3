//! Postgres backend.
//!
//! Account creation takes a `SHARE ROW EXCLUSIVE` lock on `users` inside the
//! insert transaction. The mode conflicts with itself, so concurrent
//! registrations serialise on count-then-insert and only one of them can see
//! an empty table. Readers are not blocked.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::time::Duration;
use tracing::{debug, Instrument};
use uuid::Uuid;

use super::{AccountStore, StoreError, TaskRepository};
use crate::{
    auth::{Account, Role, StoredCredentials},
    tasks::{Task, TaskDraft, TaskPatch},
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect a small pool to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self { pool })
    }

    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `sql/schema.sql`. Every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if a statement fails.
    pub async fn migrate(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        role: role.parse::<Role>().map_err(StoreError::InvalidRow)?,
    })
}

fn task_from_row(row: &PgRow) -> Result<Task, StoreError> {
    Ok(Task {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        due_date: row.try_get("due_date")?,
        status: row.try_get("status")?,
    })
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn insert_account(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Account, StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = "LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE";
        sqlx::query(query)
            .execute(&mut *tx)
            .instrument(db_span("LOCK", query))
            .await?;

        let query = "SELECT EXISTS (SELECT 1 FROM users) AS bootstrapped";
        let bootstrapped: bool = sqlx::query_scalar(query)
            .fetch_one(&mut *tx)
            .instrument(db_span("SELECT", query))
            .await?;
        let role = if bootstrapped { Role::User } else { Role::Admin };

        let query = r"
            INSERT INTO users (username, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, role
        ";
        let row = sqlx::query(query)
            .bind(username)
            .bind(password_hash)
            .bind(role.as_str())
            .fetch_one(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await;

        let row = match row {
            Ok(row) => row,
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    debug!("Failed to roll back account insert: {rollback}");
                }
                if is_unique_violation(&err) {
                    return Err(StoreError::Conflict("username already exists".to_string()));
                }
                return Err(err.into());
            }
        };

        let account = account_from_row(&row)?;
        tx.commit().await?;
        Ok(account)
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, StoreError> {
        let query = "SELECT id, username, role, password_hash FROM users WHERE username = $1";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        row.map(|row| -> Result<StoredCredentials, StoreError> {
            Ok(StoredCredentials {
                account: account_from_row(&row)?,
                password_hash: row.try_get("password_hash")?,
            })
        })
        .transpose()
    }

    async fn find_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let query = "SELECT id, username, role FROM users WHERE username = $1";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn promote_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let query = r"
            UPDATE users
            SET role = 'admin'
            WHERE username = $1
            RETURNING id, username, role
        ";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }
}

#[async_trait]
impl TaskRepository for PostgresStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let query = "SELECT id, title, description, due_date, status FROM tasks ORDER BY created_at, id";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let query = "SELECT id, title, description, due_date, status FROM tasks WHERE id = $1";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn insert_task(&self, draft: &TaskDraft) -> Result<Task, StoreError> {
        let query = r"
            INSERT INTO tasks (title, description, due_date, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, due_date, status
        ";
        let row = sqlx::query(query)
            .bind(&draft.title)
            .bind(draft.description.as_deref())
            .bind(draft.due_date.as_deref())
            .bind(draft.status.as_deref())
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;
        task_from_row(&row)
    }

    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> Result<Option<Task>, StoreError> {
        let query = r"
            UPDATE tasks
            SET
                title = COALESCE($1, title),
                description = COALESCE($2, description),
                due_date = COALESCE($3, due_date),
                status = COALESCE($4, status)
            WHERE id = $5
            RETURNING id, title, description, due_date, status
        ";
        let row = sqlx::query(query)
            .bind(patch.title.as_deref())
            .bind(patch.description.as_deref())
            .bind(patch.due_date.as_deref())
            .bind(patch.status.as_deref())
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let query = "DELETE FROM tasks WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }
}
