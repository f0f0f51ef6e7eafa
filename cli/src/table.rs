//! Result table rendering.

use recents_business::{ReportRow, UserRecord};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Display Name")]
    display_name: String,
    #[tabled(rename = "UPN")]
    user_principal_name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Department")]
    department: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "License Status")]
    license_status: String,
    #[tabled(rename = "Created Date")]
    created_date: String,
}

impl From<ReportRow> for ResultRow {
    fn from(row: ReportRow) -> Self {
        Self {
            display_name: row.display_name,
            user_principal_name: row.user_principal_name,
            email: row.email,
            department: row.department,
            role: row.role,
            license_status: row.license_status,
            created_date: row.created_date,
        }
    }
}

/// Renders `users` with the same cells the CSV and e-mail report use.
pub fn render_results(users: &[UserRecord]) -> String {
    let rows = users
        .iter()
        .map(ReportRow::from_user)
        .map(ResultRow::from);
    Table::new(rows).with(Style::rounded()).to_string()
}
