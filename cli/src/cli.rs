use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use recents_business::{FilterCriteria, LicenseStatus, MAX_LOOKBACK_DAYS, parse_date_bound};

#[derive(Parser)]
#[command(name = "recents")]
#[command(about = "Report on recently created directory users", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Application (client) id, overrides RECENTS_CLIENT_ID
    #[arg(long, global = true)]
    pub client_id: Option<String>,

    /// Tenant id or domain, overrides RECENTS_TENANT_ID
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    /// Show timing/latency information
    #[arg(long, global = true)]
    pub timing: bool,

    /// Enable verbose debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive menu (default)
    Shell,
    /// Log in, fetch, filter and print the report once
    Report(ReportArgs),
    /// Log in and list the departments of recently created users
    Departments,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// Case-insensitive text matched against name, UPN and email
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Created on or after this date (YYYY-MM-DD); needs --to
    #[arg(long)]
    pub from: Option<String>,

    /// Created on or before this date (YYYY-MM-DD); needs --from
    #[arg(long)]
    pub to: Option<String>,

    /// License status filter
    #[arg(long, short = 'l', value_enum, default_value_t = LicenseArg::Any)]
    pub license: LicenseArg,

    /// Exact department name
    #[arg(long, short = 'd')]
    pub department: Option<String>,

    /// Look back this many days instead of RECENTS_LOOKBACK_DAYS
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_LOOKBACK_DAYS))]
    pub days: Option<i64>,

    /// Write the CSV report into this directory
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Mail the report to this address
    #[arg(long, short = 'e')]
    pub email: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LicenseArg {
    #[default]
    Any,
    Licensed,
    Unlicensed,
}

impl From<LicenseArg> for LicenseStatus {
    fn from(arg: LicenseArg) -> Self {
        match arg {
            LicenseArg::Any => Self::Any,
            LicenseArg::Licensed => Self::Licensed,
            LicenseArg::Unlicensed => Self::Unlicensed,
        }
    }
}

impl ReportArgs {
    pub fn criteria(&self) -> Result<FilterCriteria> {
        Ok(FilterCriteria {
            search_text: self.search.clone().unwrap_or_default(),
            from_date: parse_bound(self.from.as_deref()).context("Invalid --from")?,
            to_date: parse_bound(self.to.as_deref()).context("Invalid --to")?,
            license_status: self.license.into(),
            department: self.department.clone(),
        })
    }
}

fn parse_bound(input: Option<&str>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    match input {
        Some(input) => parse_date_bound(input).map_err(anyhow::Error::msg),
        None => Ok(None),
    }
}
