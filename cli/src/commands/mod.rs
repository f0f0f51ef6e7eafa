//! Command implementations for the recents CLI.
//!
//! Each subcommand is implemented in its own module; the operator actions
//! they share live in [`actions`].

pub mod actions;
pub mod completions;
pub mod departments;
pub mod report;
pub mod shell;

pub use completions::generate_completions;
pub use departments::run_departments;
pub use report::run_report;
pub use shell::run_shell;
