//! Subcommand implementations.

pub mod bundle_cmd;
pub mod check;
pub mod discover;
pub mod negotiate;

use std::sync::Arc;

use anyhow::{Context, Result};

use apiscout::{
    CredentialNegotiator, HttpTransport, Negotiated, NegotiationFailure, ScoutError, Transport,
};

use crate::config::Config;

/// The HTTP transport every command shares.
pub fn transport(config: &Config) -> Result<Arc<dyn Transport>> {
    let http = HttpTransport::with_user_agent(config.user_agent())
        .context("failed to build the HTTP client")?;
    Ok(Arc::new(http))
}

pub fn negotiator(config: &Config, transport: Arc<dyn Transport>) -> CredentialNegotiator {
    CredentialNegotiator::new(config.auth.negotiator_config(), transport)
}

/// Walk the configured ladder. Exhaustion is an expected outcome and comes
/// back as `Ok(Err(..))`; anything else is a hard error.
pub async fn acquire(
    negotiator: &CredentialNegotiator,
    config: &Config,
) -> Result<std::result::Result<Negotiated, NegotiationFailure>> {
    match negotiator.negotiate(&config.auth.ladder()).await {
        Ok(n) => Ok(Ok(n)),
        Err(ScoutError::Negotiation(failure)) => Ok(Err(failure)),
        Err(e) => Err(e).context("credential negotiation could not start"),
    }
}
