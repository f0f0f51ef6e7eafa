//! Business layer of the recently created users report.
//!
//! [`App`] is the single state object: it owns the configuration, the auth
//! session, the directory API client, the user directory cache and the last
//! search result. The CLI builds one and drives it one action at a time.

pub mod app;
pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod http;
pub mod identity;
pub mod report;
pub mod session;
pub mod users;

#[cfg(test)]
mod test_utils;

pub use app::{App, LoginOutcome};
pub use config::{AppConfig, ConfigError, MAX_LOOKBACK_DAYS};
pub use error::{AppError, AppResult, AuthError};
pub use filter::{FilterCriteria, LicenseStatus, parse_date_bound, search};
pub use graph::{GRAPH_SCOPES, GraphClient, SendMailRequest};
pub use identity::{
    Account, DeviceCodeChallenge, DeviceCodePrompt, IdentityProvider, MicrosoftIdentity, SignIn,
    TokenSet,
};
pub use report::{
    REPORT_FILE_NAME, REPORT_HEADERS, REPORT_SUBJECT, ReportRow, export_csv, render_csv,
    render_html_table,
};
pub use session::{AuthSession, LOGIN_SCOPES, SessionState};
pub use users::{LicenseAssignment, LicenseState, UserDirectory, UserRecord};
