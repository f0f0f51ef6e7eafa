#![allow(clippy::exit)]

mod cli;
mod commands;
mod context;
mod output;
mod prompt;
mod table;
mod timing;

use anyhow::Result;
use clap::Parser as _;
use tracing::error;

use crate::cli::{Cli, Commands};
use crate::context::{build_app, load_config};
use crate::output::Output;

#[tokio::main]
async fn main() {
    // A missing .env is fine; the environment may already be set.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    timing::init_tracing(cli.verbose, cli.timing);
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded {}", path.display());
    }

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        Output::new().error(format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(mut cli: Cli) -> Result<()> {
    match cli.command.take().unwrap_or(Commands::Shell) {
        Commands::Completions { shell } => {
            commands::generate_completions(shell);
            Ok(())
        }
        Commands::Shell => commands::run_shell(build_app(load_config(&cli)?)).await,
        Commands::Departments => commands::run_departments(build_app(load_config(&cli)?)).await,
        Commands::Report(args) => {
            let config = match args.days {
                Some(days) => load_config(&cli)?.with_lookback_days(days),
                None => load_config(&cli)?,
            };
            commands::run_report(build_app(config), args).await
        }
    }
}
