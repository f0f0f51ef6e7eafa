//! Application state owned by the composition root.
//!
//! Every operator action is a `&mut self` method; actions never overlap.

use std::path::{Path, PathBuf};

use chrono::{TimeDelta, Utc};
use log::{error, info};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::filter::{self, FilterCriteria};
use crate::graph::{GraphClient, SendMailRequest};
use crate::http::Client;
use crate::identity::{Account, IdentityProvider};
use crate::report::{self, REPORT_SUBJECT};
use crate::session::AuthSession;
use crate::users::{UserDirectory, UserRecord};

/// Result of a login: the account, and separately how the directory fetch
/// that follows it went.
#[derive(Debug)]
pub struct LoginOutcome {
    pub account: Account,
    /// Number of users cached, or why the fetch failed.
    pub directory: AppResult<usize>,
}

pub struct App {
    config: AppConfig,
    session: AuthSession,
    graph: GraphClient,
    directory: UserDirectory,
    results: Option<Vec<UserRecord>>,
}

impl App {
    pub fn new(config: AppConfig, identity: Box<dyn IdentityProvider>, http: Client) -> Self {
        let graph = GraphClient::new(&config, http);
        Self {
            config,
            session: AuthSession::new(identity),
            graph,
            directory: UserDirectory::default(),
            results: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut AuthSession {
        &mut self.session
    }

    /// Both halves needed for a directory call.
    pub fn graph_and_session(&mut self) -> (&GraphClient, &mut AuthSession) {
        (&self.graph, &mut self.session)
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn departments(&self) -> &[String] {
        self.directory.departments()
    }

    /// The last search result, `None` before the first search.
    pub fn results(&self) -> Option<&[UserRecord]> {
        self.results.as_deref()
    }

    /// Interactive login followed by a directory fetch.
    ///
    /// A failed fetch does not undo the login; it is reported in the outcome.
    pub async fn login(&mut self) -> AppResult<LoginOutcome> {
        let account = self.session.login().await?.clone();
        let directory = self.fetch_users().await;
        if let Err(e) = &directory {
            error!("Error fetching users: {e}");
        }
        Ok(LoginOutcome { account, directory })
    }

    /// Ends the session. The cached users and results stay until the next fetch.
    pub async fn logout(&mut self) -> AppResult<()> {
        self.session.logout().await?;
        info!("Logged out");
        Ok(())
    }

    /// Replaces the cache with the users created within the lookback window.
    pub async fn fetch_users(&mut self) -> AppResult<usize> {
        let days = self.config.lookback_days();
        let since = TimeDelta::try_days(days)
            .and_then(|lookback| Utc::now().checked_sub_signed(lookback))
            .ok_or_else(|| {
                AppError::Validation(format!("Lookback of {days} days is out of range."))
            })?;
        let users = self.graph.recent_users(&mut self.session, since).await?;
        let count = users.len();
        self.directory.replace(users);
        Ok(count)
    }

    /// Distinct departments of the current cache.
    pub fn fetch_departments(&self) -> Vec<String> {
        self.directory.departments().to_vec()
    }

    /// Filters the cache and keeps the result as the displayed set.
    pub fn search(&mut self, criteria: &FilterCriteria) -> &[UserRecord] {
        let found = filter::search(self.directory.users(), criteria);
        info!(
            "Search matched {} of {} users",
            found.len(),
            self.directory.users().len()
        );
        self.results.insert(found)
    }

    /// Writes the displayed results as CSV into `dir`.
    pub fn export_csv(&self, dir: &Path) -> AppResult<PathBuf> {
        report::export_csv(self.results().unwrap_or_default(), dir)
    }

    /// Mails the displayed results as an HTML table to `admin_email`.
    pub async fn email_report(&mut self, admin_email: &str) -> AppResult<()> {
        let admin_email = admin_email.trim();
        if admin_email.is_empty() {
            return Err(AppError::Validation(
                "Please provide an admin email.".to_owned(),
            ));
        }
        let results = self.results.as_deref().unwrap_or_default();
        if results.is_empty() {
            return Err(AppError::NoData("No data to send via email.".to_owned()));
        }

        let html = report::render_html_table(&report::rows(results));
        let request = SendMailRequest::html(REPORT_SUBJECT, html, admin_email);
        self.graph.send_mail(&mut self.session, &request).await?;
        info!("Report sent to {admin_email}");
        Ok(())
    }
}
