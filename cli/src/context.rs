//! Composition root: configuration and the application state object.

use anyhow::{Context as _, Result};
use recents_business::{App, AppConfig, MicrosoftIdentity, http::Client};
use tracing::{debug, instrument};

use crate::cli::Cli;
use crate::prompt::TerminalPrompt;

const CLIENT_ID_VAR: &str = "RECENTS_CLIENT_ID";

/// Environment plus command line overrides.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut vars: Vec<(String, String)> = std::env::vars().collect();
    if let Some(client_id) = &cli.client_id {
        vars.retain(|(key, _)| key != CLIENT_ID_VAR);
        vars.push((CLIENT_ID_VAR.to_owned(), client_id.clone()));
    }

    let mut config = AppConfig::from_env_iter(vars)
        .context("Set RECENTS_CLIENT_ID (or pass --client-id) to the registered application id")?;
    if let Some(tenant) = &cli.tenant {
        config = config.with_tenant_id(tenant);
    }
    debug!(authority = %config.authority(), "Configuration loaded");
    Ok(config)
}

/// Builds the `App` wired to Microsoft identity and Graph.
#[instrument(skip_all, name = "build_app")]
pub fn build_app(config: AppConfig) -> App {
    let http = Client::new();
    let identity = MicrosoftIdentity::new(&config, http.clone(), Box::new(TerminalPrompt));
    App::new(config, Box::new(identity), http)
}
