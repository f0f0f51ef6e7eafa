//! Runtime configuration loaded from `RECENTS_*` environment variables.

use std::env::vars;

use log::info;
use serde::Deserialize;

pub const DEFAULT_TENANT: &str = "organizations";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_LOOKBACK_DAYS: i64 = 180;
/// Upper bound for the lookback window, roughly a century.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    client_id: String,
    tenant_id: String,
    authority_host: String,
    graph_base_url: String,
    lookback_days: i64,
    admin_email: Option<String>,
}

// Everything optional here; defaults and required fields are resolved in `from_raw`.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(rename = "recents_client_id")]
    client_id: Option<String>,
    #[serde(rename = "recents_tenant_id")]
    tenant_id: Option<String>,
    #[serde(rename = "recents_authority_host")]
    authority_host: Option<String>,
    #[serde(rename = "recents_graph_base_url")]
    graph_base_url: Option<String>,
    #[serde(rename = "recents_lookback_days")]
    lookback_days: Option<i64>,
    #[serde(rename = "recents_admin_email")]
    admin_email: Option<String>,
}

impl AppConfig {
    /// Configuration pointing both the identity provider and the directory API
    /// at `base_url`, for mock servers.
    pub fn new_for_test(base_url: &str) -> Self {
        Self {
            client_id: "test-client".to_owned(),
            tenant_id: "test-tenant".to_owned(),
            authority_host: base_url.to_owned(),
            graph_base_url: base_url.to_owned(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            admin_email: None,
        }
    }

    /// Reads the process environment.
    pub fn init() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment variables");
        Self::from_env_iter(vars())
    }

    /// Same as [`AppConfig::init`] over an explicit set of variables.
    pub fn from_env_iter<I, S>(iter: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let raw: RawConfig =
            serde_env::from_iter(iter).map_err(|e| ConfigError(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let RawConfig {
            client_id,
            tenant_id,
            authority_host,
            graph_base_url,
            lookback_days,
            admin_email,
        } = raw;

        let client_id = match client_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => {
                return Err(ConfigError(
                    "RECENTS_CLIENT_ID must be set to the application (client) id".to_owned(),
                ));
            }
        };

        let tenant_id = tenant_id.unwrap_or_else(|| {
            info!("RECENTS_TENANT_ID not set, defaulting to {DEFAULT_TENANT}");
            DEFAULT_TENANT.to_owned()
        });

        let lookback_days = lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
        if !(1..=MAX_LOOKBACK_DAYS).contains(&lookback_days) {
            return Err(ConfigError(format!(
                "RECENTS_LOOKBACK_DAYS must be in 1..={MAX_LOOKBACK_DAYS}, got {lookback_days}"
            )));
        }

        Ok(Self {
            client_id,
            tenant_id,
            authority_host: trim_base(authority_host.as_deref().unwrap_or(DEFAULT_AUTHORITY_HOST)),
            graph_base_url: trim_base(graph_base_url.as_deref().unwrap_or(DEFAULT_GRAPH_BASE_URL)),
            lookback_days,
            admin_email: admin_email.filter(|e| !e.trim().is_empty()),
        })
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// `{authority_host}/{tenant_id}`
    pub fn authority(&self) -> String {
        format!("{}/{}", self.authority_host, self.tenant_id)
    }

    pub fn graph_base_url(&self) -> &str {
        &self.graph_base_url
    }

    pub fn lookback_days(&self) -> i64 {
        self.lookback_days
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.admin_email.as_deref()
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);
