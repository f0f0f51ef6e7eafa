//! Report rendering: the displayed table, the CSV download and the HTML
//! mail body all come from the same [`ReportRow`]s.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{AppError, AppResult};
use crate::users::UserRecord;

pub const REPORT_HEADERS: [&str; 7] = [
    "Display Name",
    "UPN",
    "Email",
    "Department",
    "Role",
    "License Status",
    "Created Date",
];

pub const REPORT_FILE_NAME: &str = "Recently_Created_Users_Report.csv";
pub const REPORT_SUBJECT: &str = "Recently Created Users Report";

const ABSENT: &str = "N/A";

/// One displayed row of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub display_name: String,
    pub user_principal_name: String,
    pub email: String,
    pub department: String,
    pub role: String,
    pub license_status: String,
    pub created_date: String,
}

impl ReportRow {
    pub fn from_user(user: &UserRecord) -> Self {
        fn text(value: &Option<String>) -> String {
            value.as_deref().unwrap_or(ABSENT).to_owned()
        }

        Self {
            display_name: text(&user.display_name),
            user_principal_name: text(&user.user_principal_name),
            email: text(&user.mail),
            department: text(&user.department),
            role: text(&user.role),
            license_status: user.license_state().to_string(),
            created_date: user
                .created_date_time
                .map(|created| created.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| ABSENT.to_owned()),
        }
    }

    /// Cells in [`REPORT_HEADERS`] order.
    pub fn cells(&self) -> [&str; 7] {
        [
            &self.display_name,
            &self.user_principal_name,
            &self.email,
            &self.department,
            &self.role,
            &self.license_status,
            &self.created_date,
        ]
    }
}

pub fn rows(users: &[UserRecord]) -> Vec<ReportRow> {
    users.iter().map(ReportRow::from_user).collect()
}

/// Comma-joined lines with the header first.
///
/// Cells are not quoted, so a comma inside a value shifts the columns.
pub fn render_csv(rows: &[ReportRow]) -> String {
    std::iter::once(REPORT_HEADERS.join(","))
        .chain(rows.iter().map(|row| row.cells().join(",")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_html_table(rows: &[ReportRow]) -> String {
    let mut html = String::from("<table border=\"1\"><thead><tr>");
    for header in REPORT_HEADERS {
        html.push_str("<th>");
        html.push_str(&escape_html(header));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row.cells() {
            html.push_str("<td>");
            html.push_str(&escape_html(cell));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Writes the CSV report of `results` into `dir`.
///
/// Nothing is written when `results` is empty.
pub fn export_csv(results: &[UserRecord], dir: &Path) -> AppResult<PathBuf> {
    if results.is_empty() {
        return Err(AppError::NoData("No data available to download.".to_owned()));
    }

    let path = dir.join(REPORT_FILE_NAME);
    fs::write(&path, render_csv(&rows(results)))?;
    info!("Wrote {} rows to {}", results.len(), path.display());
    Ok(path)
}
