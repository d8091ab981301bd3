//! Account directory: registration, login, promotion and lookup.
//!
//! Password hashing is CPU bound and runs on the blocking pool so it never
//! stalls the request executor.

use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument};

use super::{
    models::Account,
    password::{hash_password, verify_dummy, verify_password},
};
use crate::{
    error::{Error, Result, INVALID_CREDENTIALS},
    store::{with_deadline, AccountStore, DEFAULT_STORE_TIMEOUT},
};

pub struct UserDirectory {
    accounts: Arc<dyn AccountStore>,
    timeout: Duration,
}

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl UserDirectory {
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            accounts,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a new account. The very first account becomes `admin`.
    ///
    /// # Errors
    /// - `Error::Validation` if either argument is empty
    /// - `Error::Conflict` if the username is taken
    /// - `Error::Internal` on hashing or storage failure
    #[instrument(skip(self, password))]
    pub async fn create_account(&self, username: &str, password: &str) -> Result<Account> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::validation("username and password required"));
        }

        let password = password.to_owned();
        let digest = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| Error::internal(format!("hashing task failed: {err}")))??;

        let account = with_deadline(
            self.timeout,
            self.accounts.insert_account(username, &digest),
        )
        .await?;

        info!(username = %account.username, role = %account.role, "account created");
        Ok(account)
    }

    /// Check a username/password pair.
    ///
    /// Unknown usernames still pay for one hash verification, and both failure
    /// paths return the same error.
    ///
    /// # Errors
    /// `Error::Auth` on any mismatch, `Error::Internal` on storage failure.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::Auth(INVALID_CREDENTIALS));
        }

        let stored = with_deadline(self.timeout, self.accounts.find_credentials(username)).await?;

        let password = password.to_owned();
        let account = tokio::task::spawn_blocking(move || match stored {
            Some(stored) if verify_password(&stored.password_hash, &password) => {
                Some(stored.account)
            }
            Some(_) => None,
            None => {
                verify_dummy(&password);
                None
            }
        })
        .await
        .map_err(|err| Error::internal(format!("verification task failed: {err}")))?;

        account.ok_or_else(|| {
            debug!("authentication failed");
            Error::Auth(INVALID_CREDENTIALS)
        })
    }

    /// Grant `admin`. Promoting an existing admin is a no-op that succeeds.
    ///
    /// # Errors
    /// `Error::NotFound` if the username does not exist.
    #[instrument(skip(self))]
    pub async fn promote_to_admin(&self, username: &str) -> Result<Account> {
        let account = with_deadline(self.timeout, self.accounts.promote_account(username))
            .await?
            .ok_or_else(|| Error::NotFound("user not found".to_string()))?;
        info!(username = %account.username, "account promoted to admin");
        Ok(account)
    }

    /// # Errors
    /// `Error::Internal` on storage failure. An unknown username is `Ok(None)`.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        Ok(with_deadline(self.timeout, self.accounts.find_account(username)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::Role, store::MemoryStore};

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn first_account_is_admin_rest_are_users() -> Result<()> {
        let directory = directory();
        let root = directory.create_account("root", "pw").await?;
        let alice = directory.create_account("alice", "pw").await?;
        let bob = directory.create_account("bob", "pw").await?;
        assert_eq!(root.role, Role::Admin);
        assert_eq!(alice.role, Role::User);
        assert_eq!(bob.role, Role::User);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() -> Result<()> {
        let directory = directory();
        directory.create_account("alice", "x").await?;
        let result = directory.create_account("alice", "x").await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        Ok(())
    }

    #[tokio::test]
    async fn empty_arguments_are_rejected() {
        let directory = directory();
        assert!(matches!(
            directory.create_account("", "pw").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            directory.create_account("alice", "").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn authenticate_returns_account() -> Result<()> {
        let directory = directory();
        let created = directory.create_account("alice", "secret").await?;
        let account = directory.authenticate("alice", "secret").await?;
        assert_eq!(account, created);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_fail_identically() -> Result<()> {
        let directory = directory();
        directory.create_account("alice", "secret").await?;

        let wrong = directory.authenticate("alice", "nope").await;
        let unknown = directory.authenticate("mallory", "secret").await;

        let (Err(wrong), Err(unknown)) = (wrong, unknown) else {
            panic!("both attempts should fail");
        };
        assert!(matches!(wrong, Error::Auth(_)));
        assert!(matches!(unknown, Error::Auth(_)));
        assert_eq!(wrong.to_string(), unknown.to_string());
        Ok(())
    }

    #[tokio::test]
    async fn promote_is_idempotent() -> Result<()> {
        let directory = directory();
        directory.create_account("root", "pw").await?;
        directory.create_account("alice", "pw").await?;

        let first = directory.promote_to_admin("alice").await?;
        let second = directory.promote_to_admin("alice").await?;
        assert_eq!(first.role, Role::Admin);
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn promote_unknown_is_not_found() {
        let result = directory().promote_to_admin("ghost").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn find_by_username_absent_is_none() -> Result<()> {
        let directory = directory();
        assert_eq!(directory.find_by_username("nobody").await?, None);
        let created = directory.create_account("alice", "pw").await?;
        assert_eq!(directory.find_by_username("alice").await?, Some(created));
        Ok(())
    }
}
