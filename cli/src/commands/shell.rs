//! Interactive menu: the terminal counterpart of the report page.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use inquire::{InquireError, Select, Text};
use recents_business::{App, AppError, FilterCriteria, LicenseStatus, parse_date_bound};
use tracing::{error, instrument};

use crate::commands::actions;
use crate::output::Output;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MenuAction {
    Login,
    Search,
    Departments,
    DownloadCsv,
    EmailReport,
    Logout,
    Quit,
}

impl MenuAction {
    const ALL: [Self; 7] = [
        Self::Login,
        Self::Search,
        Self::Departments,
        Self::DownloadCsv,
        Self::EmailReport,
        Self::Logout,
        Self::Quit,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "Login",
            Self::Search => "Search",
            Self::Departments => "Show departments",
            Self::DownloadCsv => "Download CSV",
            Self::EmailReport => "Email report",
            Self::Logout => "Logout",
            Self::Quit => "Quit",
        })
    }
}

const ALL_DEPARTMENTS: &str = "All departments";

#[instrument(skip_all, name = "shell")]
pub async fn run_shell(mut app: App) -> Result<()> {
    let out = Output::new();
    out.header("Recently Created Users");
    out.dim(format!(
        "Users created in the last {} days",
        app.config().lookback_days()
    ));

    loop {
        let status = match app.session().active_account() {
            Some(account) if app.session().state().is_authenticated() => {
                format!("Signed in as {}", account.username)
            }
            Some(account) => format!("Session of {} expired, log in again", account.username),
            None => "Not signed in".to_owned(),
        };

        out.newline();
        let choice = Select::new("What next?", MenuAction::ALL.to_vec())
            .with_help_message(&status)
            .prompt_skippable();
        let action = match choice {
            Ok(Some(action)) => action,
            Ok(None) | Err(InquireError::OperationInterrupted) => MenuAction::Quit,
            Err(e) => return Err(e).context("Failed to read menu selection"),
        };
        if action == MenuAction::Quit {
            return Ok(());
        }

        if let Err(e) = run_action(&mut app, action, &out).await {
            match e.downcast_ref::<InquireError>() {
                Some(InquireError::OperationCanceled) => out.dim("Cancelled."),
                Some(InquireError::OperationInterrupted) => return Ok(()),
                _ => return Err(e),
            }
        }
    }
}

/// Runs one menu action. Failed actions become notices; only terminal
/// errors are returned.
async fn run_action(app: &mut App, action: MenuAction, out: &Output) -> Result<()> {
    let result = match action {
        MenuAction::Login => match actions::login(app, out).await {
            Ok(outcome) => {
                // Signed in, but the cache may be stale or empty.
                if let Err(e) = outcome.directory {
                    out.notice("Error fetching users", &e);
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        MenuAction::Search => {
            if let Some(criteria) = prompt_criteria(app, out)? {
                actions::search(app, &criteria, out);
            }
            Ok(())
        }
        MenuAction::Departments => {
            actions::departments(app, out);
            Ok(())
        }
        MenuAction::DownloadCsv => {
            let dir = Text::new("Save report to directory:")
                .with_default(".")
                .prompt()
                .context("Failed to read directory")?;
            actions::export_csv(app, &PathBuf::from(dir), out)
        }
        MenuAction::EmailReport => {
            let mut prompt = Text::new("Admin email:");
            if let Some(default) = app.config().admin_email() {
                prompt = prompt.with_default(default);
            }
            let admin_email = prompt.prompt().context("Failed to read admin email")?;
            actions::email_report(app, &admin_email, out).await
        }
        MenuAction::Logout => actions::logout(app, out).await,
        MenuAction::Quit => Ok(()),
    };

    if let Err(e) = result {
        report_failure(out, action, &e);
    }
    Ok(())
}

fn report_failure(out: &Output, action: MenuAction, err: &AppError) {
    error!("{action} failed: {err}");
    out.notice(&format!("{action} failed"), err);
}

/// Asks for the search form fields. `None` when a date does not parse.
fn prompt_criteria(app: &App, out: &Output) -> Result<Option<FilterCriteria>> {
    let search_text = Text::new("Search text:")
        .with_help_message("Matches name, UPN or email; leave empty for all")
        .prompt()
        .context("Failed to read search text")?;

    let from = Text::new("Created from (YYYY-MM-DD):")
        .with_help_message("Both dates are needed to filter by date")
        .prompt()
        .context("Failed to read start date")?;
    let to = Text::new("Created to (YYYY-MM-DD):")
        .prompt()
        .context("Failed to read end date")?;
    let (from_date, to_date) = match (parse_date_bound(&from), parse_date_bound(&to)) {
        (Ok(from_date), Ok(to_date)) => (from_date, to_date),
        (Err(message), _) | (_, Err(message)) => {
            out.warning(message);
            return Ok(None);
        }
    };

    let license_status = Select::new(
        "License status:",
        vec![
            LicenseStatus::Any,
            LicenseStatus::Licensed,
            LicenseStatus::Unlicensed,
        ],
    )
    .prompt()
    .context("Failed to read license status")?;

    let mut options = vec![ALL_DEPARTMENTS.to_owned()];
    options.extend(app.departments().iter().cloned());
    let department = Select::new("Department:", options)
        .raw_prompt()
        .context("Failed to read department")?;
    let department = (department.index > 0).then_some(department.value);

    Ok(Some(FilterCriteria {
        search_text,
        from_date,
        to_date,
        license_status,
        department,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_lists_every_action_once() {
        let labels: Vec<_> = MenuAction::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            [
                "Login",
                "Search",
                "Show departments",
                "Download CSV",
                "Email report",
                "Logout",
                "Quit"
            ]
        );
    }
}
