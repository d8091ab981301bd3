use crate::{
    api,
    auth::TokenService,
    cli::telemetry,
    store,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub token_ttl: Duration,
    pub store_timeout: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let backend = store::connect(&args.dsn)
        .await
        .context("Failed to open store")?;
    info!("Store ready");

    let tokens = TokenService::new(args.jwt_secret).with_ttl(args.token_ttl);
    debug!("Token lifetime: {:?}", tokens.ttl());

    let result = api::new(args.port, backend, tokens, args.store_timeout).await;

    telemetry::shutdown_tracer();

    result
}
