//! # Taskgate
//!
//! `taskgate` serves task records behind username/password accounts with two
//! roles, `admin` and `user`.
//!
//! ## Accounts
//!
//! The first account ever registered becomes `admin`; every later account is a
//! plain `user` until an admin promotes it. Passwords are stored as Argon2id
//! PHC strings and never leave the storage layer.
//!
//! ## Tokens
//!
//! Login and registration return a stateless HS256 token carrying the username
//! and role. Tokens expire by time alone (24 hours by default); there is no
//! revocation list and no refresh flow.
//!
//! ## Access control
//!
//! Every `/tasks` route requires a valid bearer token. Creating, updating and
//! deleting tasks, as well as promoting accounts, additionally require the
//! `admin` role.
//!
//! ## Tasks
//!
//! Updates are partial: only non-empty fields in the request body are merged
//! into the stored record; everything else is left untouched.

pub mod api;
pub mod auth;
pub mod cli;
pub mod error;
pub mod store;
pub mod tasks;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
