//! Departments command.

use anyhow::Result;
use recents_business::App;
use tracing::instrument;

use crate::commands::actions;
use crate::output::Output;

#[instrument(skip_all, name = "departments")]
pub async fn run_departments(mut app: App) -> Result<()> {
    let out = Output::new();

    let outcome = actions::login(&mut app, &out).await?;
    outcome.directory?;

    actions::departments(&app, &out);
    Ok(())
}
