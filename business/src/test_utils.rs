//! Test utilities for the business layer.
//!
//! [`TestContext`] wires an [`App`] to a wiremock server standing in for the
//! directory API and to a [`FakeIdentity`] that signs in without any network.
//!
//! ```ignore
//! let mut ctx = TestContext::new().await;
//! ctx.mock_users(sample_users_json()).await;
//! ctx.app.login().await?;
//! ```

#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::app::App;
use crate::config::AppConfig;
use crate::error::AuthError;
use crate::http::Client;
use crate::identity::{Account, IdentityProvider, SignIn, TokenSet};

pub const TEST_USERNAME: &str = "admin@contoso.com";
pub const TEST_ACCESS_TOKEN: &str = "test_token";

/// Identity provider that signs in instantly with fixed tokens.
#[derive(Clone, Default)]
pub struct FakeIdentity {
    sign_in_calls: Arc<AtomicUsize>,
    refresh_calls: Arc<AtomicUsize>,
    sign_out_calls: Arc<AtomicUsize>,
    fail_sign_in: Arc<AtomicBool>,
}

impl FakeIdentity {
    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Makes the next sign-in fail as if the operator declined.
    pub fn fail_next_sign_in(&self) {
        self.fail_sign_in.store(true, Ordering::SeqCst);
    }
}

fn test_tokens() -> TokenSet {
    TokenSet {
        access_token: TEST_ACCESS_TOKEN.to_owned(),
        refresh_token: Some("test_refresh".to_owned()),
        expires_at: Utc::now() + TimeDelta::hours(1),
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self, _scopes: &[&str]) -> Result<SignIn, AuthError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_in.swap(false, Ordering::SeqCst) {
            return Err(AuthError::Declined);
        }
        Ok(SignIn {
            account: Account {
                username: TEST_USERNAME.to_owned(),
                name: Some("Test Admin".to_owned()),
                tenant_id: Some("test-tenant".to_owned()),
                object_id: None,
            },
            tokens: test_tokens(),
        })
    }

    async fn refresh(&self, _refresh_token: &str, _scopes: &[&str]) -> Result<TokenSet, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(test_tokens())
    }

    async fn sign_out(&self, _account: &Account) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Test context that holds a mock server and an `App` pointed at it.
pub struct TestContext {
    pub mock_server: MockServer,
    pub app: App,
    pub identity: FakeIdentity,
}

impl TestContext {
    pub async fn new() -> Self {
        let mock_server = MockServer::start().await;
        let base_url = mock_server.uri();
        Self::build(mock_server, &base_url)
    }

    /// Points the directory API somewhere other than the mock server.
    pub async fn with_graph_base_url(base_url: &str) -> Self {
        let mock_server = MockServer::start().await;
        Self::build(mock_server, base_url)
    }

    fn build(mock_server: MockServer, base_url: &str) -> Self {
        let identity = FakeIdentity::default();
        let app = App::new(
            AppConfig::new_for_test(base_url),
            Box::new(identity.clone()),
            Client::new(),
        );
        Self {
            mock_server,
            app,
            identity,
        }
    }

    /// Signs in without fetching the directory.
    pub async fn login(&mut self) {
        self.app
            .session_mut()
            .login()
            .await
            .expect("fake sign-in should succeed");
    }

    pub async fn received_requests(&self) -> Vec<Request> {
        self.mock_server
            .received_requests()
            .await
            .unwrap_or_default()
    }

    /// Serves `body` for `GET /users`.
    pub async fn mock_users(&self, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.mock_server)
            .await;
    }
}

/// Alice (HR, unlicensed) and Bob (IT, licensed).
pub fn sample_users_json() -> serde_json::Value {
    serde_json::json!({
        "value": [
            {
                "displayName": "Alice",
                "userPrincipalName": "alice@contoso.com",
                "mail": "a@x.com",
                "department": "HR",
                "assignedLicenses": [],
                "createdDateTime": "2024-01-01T00:00:00Z"
            },
            {
                "displayName": "Bob",
                "userPrincipalName": "bob@contoso.com",
                "mail": "b@x.com",
                "department": "IT",
                "assignedLicenses": [ {} ],
                "createdDateTime": "2024-06-01T00:00:00Z"
            }
        ]
    })
}
