//! Terminal output utilities for styled CLI output.
//!
//! Operator notices go through [`Output`] instead of direct `println!` calls.

use std::fmt::Display;

use console::{Term, style};
use recents_business::AppError;

/// Terminal output helper for consistent styled output.
pub struct Output {
    term: Term,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper writing to stdout.
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    /// Print a success message with a green checkmark.
    pub fn success(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("✓").green().bold(), message)),
        );
    }

    /// Print an error message with a red X.
    pub fn error(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("✗").red().bold(), message)),
        );
    }

    /// Print a warning message with a yellow warning sign.
    pub fn warning(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("⚠").yellow().bold(), message)),
        );
    }

    /// Print an info message with a blue info icon.
    pub fn info(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("ℹ").blue().bold(), message)),
        );
    }

    /// Print a plain message without any prefix.
    pub fn print(&self, message: impl Display) {
        drop(self.term.write_line(&message.to_string()));
    }

    pub fn newline(&self) {
        drop(self.term.write_line(""));
    }

    /// Print a header with emphasis.
    pub fn header(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&style(message).bold().cyan().to_string()),
        );
    }

    /// Print a labeled value with indentation.
    pub fn labeled_indent(&self, label: impl Display, value: impl Display, indent: usize) {
        let spaces = " ".repeat(indent);
        drop(
            self.term
                .write_line(&format!("{spaces}{}: {}", style(label).dim(), value)),
        );
    }

    /// Print a dim/muted message.
    pub fn dim(&self, message: impl Display) {
        drop(self.term.write_line(&style(message).dim().to_string()));
    }

    /// Print a count summary.
    pub fn count(&self, label: impl Display, count: usize) {
        drop(self.term.write_line(&format!(
            "{}: {} user(s)",
            style(label).dim(),
            style(count).cyan().bold()
        )));
    }

    /// Turns a failed operator action into a notice.
    pub fn notice(&self, action: &str, err: &AppError) {
        match notice_text(action, err) {
            (Severity::Warning, text) => self.warning(text),
            (Severity::Error, text) => self.error(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Missing input, empty exports and expired sessions are warnings, everything
/// else an error.
pub fn notice_text(action: &str, err: &AppError) -> (Severity, String) {
    match err {
        AppError::Validation(message) | AppError::NoData(message) => {
            (Severity::Warning, message.clone())
        }
        // Already tells the operator to log in.
        AppError::Precondition => (Severity::Warning, format!("{action}: {err}")),
        err if err.needs_login() => {
            (Severity::Warning, format!("{action}: {err}. Please log in."))
        }
        err => (Severity::Error, format!("{action}: {err}")),
    }
}
