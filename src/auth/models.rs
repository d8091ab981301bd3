use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Account projection returned to callers. Never carries the password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

/// Account as read back for password verification.
#[derive(Clone)]
pub struct StoredCredentials {
    pub account: Account,
    pub password_hash: String,
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("account", &self.account)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Body of `/register` and `/login`. Missing fields decode as empty strings so
/// validation can report them uniformly.
#[derive(Clone, Deserialize, ToSchema)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountWithToken {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub token: String,
}

impl AccountWithToken {
    #[must_use]
    pub fn new(account: Account, token: String) -> Self {
        Self {
            id: account.id,
            username: account.username,
            role: account.role,
            token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn account_serializes_without_hash() -> Result<(), serde_json::Error> {
        let account = Account {
            id: Uuid::nil(),
            username: "alice".to_string(),
            role: Role::User,
        };
        let value = serde_json::to_value(&account)?;
        assert_eq!(value["username"], "alice");
        assert_eq!(value["role"], "user");
        assert!(value.get("password_hash").is_none());
        Ok(())
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{credentials:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn credentials_default_missing_fields() -> Result<(), serde_json::Error> {
        let credentials: Credentials = serde_json::from_str(r#"{"username":"bob"}"#)?;
        assert_eq!(credentials.username, "bob");
        assert!(credentials.password.is_empty());
        Ok(())
    }
}
