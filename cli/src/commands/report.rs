//! One-shot report: login, fetch, filter, print, then optional CSV and e-mail.

use anyhow::{Result, bail};
use recents_business::App;
use tracing::instrument;

use crate::cli::ReportArgs;
use crate::commands::actions;
use crate::output::Output;

#[instrument(skip_all, name = "report")]
pub async fn run_report(mut app: App, args: ReportArgs) -> Result<()> {
    let out = Output::new();
    // Bad dates should fail before the operator goes through sign-in.
    let criteria = args.criteria()?;
    if let Some(email) = &args.email
        && email.trim().is_empty()
    {
        bail!("Please provide an admin email.");
    }

    let outcome = actions::login(&mut app, &out).await?;
    outcome.directory?;

    actions::search(&mut app, &criteria, &out);

    if let Some(dir) = &args.csv {
        actions::export_csv(&app, dir, &out)?;
    }
    if let Some(email) = &args.email {
        actions::email_report(&mut app, email, &out).await?;
    }
    Ok(())
}
