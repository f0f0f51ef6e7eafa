//! Error taxonomy shared by every operation of the business layer.
//!
//! Operator actions catch these at the top level and turn them into notices;
//! nothing here is fatal to the process.

use thiserror::Error;

/// Failures of the identity provider or of the in-memory session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The operator declined the sign-in request.
    #[error("sign-in was declined")]
    Declined,
    /// The device code expired before the operator finished signing in.
    #[error("sign-in code expired before it was used")]
    Expired,
    /// Silent acquisition was rejected; the operator has to sign in again.
    #[error("session expired, please log in again")]
    InteractionRequired,
    /// No account is signed in.
    #[error("no active session")]
    NoSession,
    /// Any other error reported by the identity provider.
    #[error("identity provider error {code}: {description}")]
    Provider { code: String, description: String },
    /// The identity provider could not be reached.
    #[error("failed to reach identity provider: {0}")]
    Transport(String),
    /// The ID token in the token response could not be decoded.
    #[error("invalid id token: {0}")]
    InvalidIdToken(String),
}

/// Errors surfaced by application operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    /// An API call was attempted without an active session.
    #[error("Please log in first.")]
    Precondition,
    /// Network level failure reaching the directory API.
    #[error("failed to reach the directory API: {0}")]
    Transport(String),
    /// Non-success HTTP status from the directory API.
    #[error("Graph API call failed: {status} {status_text}")]
    Api {
        status: u16,
        status_text: String,
        body: String,
    },
    #[error("failed to decode directory API response: {0}")]
    Decode(String),
    /// Required operator input is missing.
    #[error("{0}")]
    Validation(String),
    /// There is nothing to export.
    #[error("{0}")]
    NoData(String),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Returns true when the operator has to sign in (again) before retrying.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            Self::Precondition
                | Self::Auth(AuthError::NoSession | AuthError::InteractionRequired)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
