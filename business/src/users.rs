//! User records and the session-scoped user directory cache.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields projected by the user fetch, in `$select` order.
pub const USER_SELECT_FIELDS: &[&str] = &[
    "displayName",
    "userPrincipalName",
    "mail",
    "department",
    "assignedLicenses",
    "createdDateTime",
];

/// A license assigned to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseAssignment {
    #[serde(default)]
    pub sku_id: Option<String>,
    #[serde(default)]
    pub disabled_plans: Vec<String>,
}

/// A user as returned by the directory API. Absent fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    /// Not part of the projection; kept for the report's Role column.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub assigned_licenses: Vec<LicenseAssignment>,
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,
}

/// Whether a user holds any license.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    Licensed,
    Unlicensed,
}

impl fmt::Display for LicenseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Licensed => f.write_str("Licensed"),
            Self::Unlicensed => f.write_str("Unlicensed"),
        }
    }
}

impl UserRecord {
    pub fn license_state(&self) -> LicenseState {
        if self.assigned_licenses.is_empty() {
            LicenseState::Unlicensed
        } else {
            LicenseState::Licensed
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<LicenseAssignment>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<LicenseAssignment>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One page of the `/users` collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsersPage {
    #[serde(default)]
    pub value: Vec<UserRecord>,
    /// Link to the next page. Never followed.
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// In-memory list of recently created users, replaced wholesale on every fetch.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<UserRecord>,
    departments: Vec<String>,
    loaded: bool,
}

impl UserDirectory {
    /// Replaces the cached users and recomputes the department list.
    pub fn replace(&mut self, users: Vec<UserRecord>) {
        self.departments = distinct_departments(&users);
        self.users = users;
        self.loaded = true;
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    /// Distinct non-empty departments, in order of first appearance.
    pub fn departments(&self) -> &[String] {
        &self.departments
    }

    /// False until the first fetch, even one that returned no users.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Distinct non-empty `department` values, in order of first appearance.
pub fn distinct_departments(users: &[UserRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    users
        .iter()
        .filter_map(|u| u.department.as_deref())
        .filter(|d| !d.is_empty())
        .filter(|d| seen.insert(*d))
        .map(str::to_owned)
        .collect()
}
