//! Operator actions shared by the interactive shell and the one-shot commands.
//!
//! Each action runs to completion and prints its own success output. Errors
//! are returned untouched; the caller decides between a notice and an exit.

use std::path::Path;

use recents_business::{App, AppResult, FilterCriteria, LoginOutcome, UserRecord};
use tracing::{info, instrument};

use crate::output::Output;
use crate::table::render_results;

/// Interactive login followed by the directory fetch.
///
/// The fetch result is left in the outcome for the caller to judge.
#[instrument(skip_all, name = "login")]
pub async fn login(app: &mut App, out: &Output) -> AppResult<LoginOutcome> {
    let outcome = app.login().await?;
    out.success(format!("Logged in as {}", outcome.account.username));
    if let Ok(count) = &outcome.directory {
        info!(count, "Directory loaded");
        out.count("Recently created", *count);
    }
    Ok(outcome)
}

#[instrument(skip_all, name = "logout")]
pub async fn logout(app: &mut App, out: &Output) -> AppResult<()> {
    app.logout().await?;
    out.success("Logged out.");
    Ok(())
}

#[instrument(skip_all, name = "search")]
pub fn search(app: &mut App, criteria: &FilterCriteria, out: &Output) {
    let results = app.search(criteria);
    if let Some(notice) = empty_results_notice(results) {
        out.warning(notice);
    }
    out.print(render_results(results));
    out.count("Results", results.len());
}

fn empty_results_notice(results: &[UserRecord]) -> Option<&'static str> {
    results.is_empty().then_some("No matching results found.")
}

pub fn departments(app: &App, out: &Output) {
    if !app.directory().is_loaded() {
        out.info("Log in to load the directory first.");
        return;
    }
    let departments = app.fetch_departments();
    if departments.is_empty() {
        out.dim("No departments found.");
        return;
    }
    out.header("Departments");
    for department in departments {
        out.print(format!("  {department}"));
    }
}

#[instrument(skip_all, name = "export_csv", fields(dir = %dir.display()))]
pub fn export_csv(app: &App, dir: &Path, out: &Output) -> AppResult<()> {
    let path = app.export_csv(dir)?;
    out.success(format!("Report saved to {}", path.display()));
    Ok(())
}

#[instrument(skip_all, name = "email_report")]
pub async fn email_report(app: &mut App, admin_email: &str, out: &Output) -> AppResult<()> {
    app.email_report(admin_email).await?;
    out.success("Email sent successfully.");
    Ok(())
}
