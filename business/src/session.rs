//! Auth session manager.
//!
//! Tracks which operator is signed in and hands out access tokens. Tokens
//! live only in memory for the span of one login.
//!
//! ```text
//!                  login ok
//! Unauthenticated ----------> Authenticated
//!       ^                      |        ^
//!       | logout               | refresh | login ok
//!       |                      v rejected|
//!       +-------------- InteractionRequired
//! ```

use chrono::{TimeDelta, Utc};
use log::{info, warn};

use crate::error::AuthError;
use crate::identity::{Account, IdentityProvider, TokenSet};

/// Scopes requested by the interactive login.
pub const LOGIN_SCOPES: &[&str] = &[
    "openid",
    "profile",
    "offline_access",
    "User.Read.All",
    "Directory.Read.All",
    "Mail.Send",
];

/// A cached access token is reused while it is valid for at least this long.
const EXPIRY_SKEW_SECS: i64 = 300;

/// Authentication status of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No operator signed in.
    #[default]
    Unauthenticated,
    /// Signed in; tokens can be acquired silently.
    Authenticated(Account),
    /// Signed in, but silent acquisition was rejected. Only a new login helps.
    InteractionRequired(Account),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Authenticated(account) | Self::InteractionRequired(account) => Some(account),
            Self::Unauthenticated => None,
        }
    }
}

pub struct AuthSession {
    provider: Box<dyn IdentityProvider>,
    state: SessionState,
    tokens: Option<TokenSet>,
}

impl AuthSession {
    pub fn new(provider: Box<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            state: SessionState::Unauthenticated,
            tokens: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The current session identity, `None` when nobody is signed in.
    pub fn active_account(&self) -> Option<&Account> {
        self.state.account()
    }

    /// Interactive login. On failure the previous state is kept as is.
    pub async fn login(&mut self) -> Result<&Account, AuthError> {
        let sign_in = self.provider.sign_in(LOGIN_SCOPES).await?;
        info!("Login successful for {}", sign_in.account.username);

        self.tokens = Some(sign_in.tokens);
        self.state = SessionState::Authenticated(sign_in.account);
        self.state.account().ok_or(AuthError::NoSession)
    }

    /// Ends the session. The user directory is left alone.
    pub async fn logout(&mut self) -> Result<(), AuthError> {
        let Some(account) = self.state.account().cloned() else {
            return Err(AuthError::NoSession);
        };

        // Local state goes regardless of what the provider says.
        self.tokens = None;
        self.state = SessionState::Unauthenticated;
        self.provider.sign_out(&account).await
    }

    /// Silent token acquisition; never falls back to an interactive prompt.
    pub async fn acquire_token(&mut self, scopes: &[&str]) -> Result<String, AuthError> {
        let account = match &self.state {
            SessionState::Unauthenticated => return Err(AuthError::NoSession),
            SessionState::InteractionRequired(_) => return Err(AuthError::InteractionRequired),
            SessionState::Authenticated(account) => account.clone(),
        };

        if let Some(tokens) = &self.tokens
            && tokens.expires_at - Utc::now() > TimeDelta::seconds(EXPIRY_SKEW_SECS)
        {
            return Ok(tokens.access_token.clone());
        }

        let refresh_token = self
            .tokens
            .as_ref()
            .and_then(|t| t.refresh_token.clone());
        let Some(refresh_token) = refresh_token else {
            warn!("Access token expired and no refresh token is available");
            self.state = SessionState::InteractionRequired(account);
            return Err(AuthError::InteractionRequired);
        };

        match self.provider.refresh(&refresh_token, scopes).await {
            Ok(mut fresh) => {
                // The provider may not rotate the refresh token.
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token = Some(refresh_token);
                }
                let access_token = fresh.access_token.clone();
                self.tokens = Some(fresh);
                Ok(access_token)
            }
            Err(err) => {
                warn!("Silent token acquisition failed: {err}");
                if matches!(err, AuthError::InteractionRequired) {
                    self.tokens = None;
                    self.state = SessionState::InteractionRequired(account);
                }
                Err(err)
            }
        }
    }
}
