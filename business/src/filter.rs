//! Client-side filtering of the cached user list.
//!
//! Every criterion is independent and an empty criterion matches everything.
//! Filtering keeps the cache order and never touches the cache itself.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};

use crate::users::{LicenseState, UserRecord};

/// License filter as offered in the license dropdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LicenseStatus {
    #[default]
    Any,
    Licensed,
    Unlicensed,
}

impl LicenseStatus {
    pub fn matches(self, state: LicenseState) -> bool {
        match self {
            Self::Any => true,
            Self::Licensed => state == LicenseState::Licensed,
            Self::Unlicensed => state == LicenseState::Unlicensed,
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Licensed => f.write_str("Licensed"),
            Self::Unlicensed => f.write_str("Unlicensed"),
        }
    }
}

impl FromStr for LicenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "any" => Ok(Self::Any),
            "licensed" => Ok(Self::Licensed),
            "unlicensed" => Ok(Self::Unlicensed),
            other => Err(format!(
                "unknown license status '{other}', expected any, licensed or unlicensed"
            )),
        }
    }
}

/// Search criteria, built per search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Case-insensitive substring of display name, UPN or mail.
    pub search_text: String,
    /// Inclusive lower bound; only used together with `to_date`.
    pub from_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound; only used together with `from_date`.
    pub to_date: Option<DateTime<Utc>>,
    pub license_status: LicenseStatus,
    /// Exact, case-sensitive department.
    pub department: Option<String>,
}

impl FilterCriteria {
    pub fn matches(&self, user: &UserRecord) -> bool {
        self.matches_text(user)
            && self.matches_date_range(user)
            && self.license_status.matches(user.license_state())
            && self.matches_department(user)
    }

    fn matches_text(&self, user: &UserRecord) -> bool {
        if self.search_text.is_empty() {
            return true;
        }
        let needle = self.search_text.to_lowercase();
        [&user.display_name, &user.user_principal_name, &user.mail]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    // A single bound is ignored on purpose: the range only engages with both.
    fn matches_date_range(&self, user: &UserRecord) -> bool {
        let (Some(from), Some(to)) = (self.from_date, self.to_date) else {
            return true;
        };
        user.created_date_time
            .is_some_and(|created| created >= from && created <= to)
    }

    fn matches_department(&self, user: &UserRecord) -> bool {
        match self.department.as_deref() {
            None | Some("") => true,
            Some(department) => user.department.as_deref() == Some(department),
        }
    }
}

/// Records matching `criteria`, in their original order.
pub fn search(users: &[UserRecord], criteria: &FilterCriteria) -> Vec<UserRecord> {
    users
        .iter()
        .filter(|user| criteria.matches(user))
        .cloned()
        .collect()
}

/// Parses a date bound as typed by the operator.
///
/// `YYYY-MM-DD` is midnight UTC of that day; RFC 3339 timestamps are taken
/// as is. Blank input means "no bound".
pub fn parse_date_bound(input: &str) -> Result<Option<DateTime<Utc>>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()));
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| format!("invalid date '{input}', expected YYYY-MM-DD"))
}
