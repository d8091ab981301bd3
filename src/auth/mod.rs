//! Accounts, credentials, tokens and the request gates built on them.
//!
//! Flow Overview:
//! 1) `directory` creates and authenticates accounts, hashing passwords with `password`.
//! 2) `token` turns an account into a signed, time-bounded bearer token.
//! 3) `guard` validates that token on every protected request and enforces roles.

pub mod directory;
pub mod guard;
mod models;
pub mod password;
pub mod token;

pub use directory::UserDirectory;
pub use guard::{GuardError, Principal};
pub use models::{Account, AccountWithToken, Credentials, Role, StoredCredentials};
pub use token::{Claims, TokenError, TokenService};
