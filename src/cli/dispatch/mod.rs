//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an action carrying the full server
//! configuration.

use crate::cli::{
    actions::{server::Args, Action},
    commands::{ARG_DSN, ARG_JWT_SECRET, ARG_PORT, ARG_STORE_TIMEOUT, ARG_TOKEN_TTL},
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the secret is blank.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let jwt_secret = matches
        .get_one::<String>(ARG_JWT_SECRET)
        .filter(|secret| !secret.trim().is_empty())
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: --{ARG_JWT_SECRET}"))?;

    let token_ttl = matches.get_one::<u64>(ARG_TOKEN_TTL).copied().unwrap_or(86_400);
    let store_timeout = matches.get_one::<u64>(ARG_STORE_TIMEOUT).copied().unwrap_or(5);

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: SecretString::from(jwt_secret),
        token_ttl: Duration::from_secs(token_ttl),
        store_timeout: Duration::from_secs(store_timeout),
    }))
}
