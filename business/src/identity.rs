//! Identity provider integration.
//!
//! [`IdentityProvider`] is the seam between the session and the outside
//! world. [`MicrosoftIdentity`] implements it with the OAuth 2.0 device
//! authorization grant against Microsoft identity platform:
//!
//! 1. `POST {authority}/oauth2/v2.0/devicecode` returns a user code.
//! 2. The operator enters the code at the verification URI in any browser.
//! 3. The token endpoint is polled until the operator finishes or declines.
//!
//! Silent acquisition uses the refresh token grant. Nothing is written to disk.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use log::{info, warn};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::AuthError;
use crate::http::{Client, Response};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
/// Default polling interval in seconds, also the step added on `slow_down`.
const SLOW_DOWN_STEP: u64 = 5;

/// The signed-in operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// `preferred_username`, usually the UPN.
    pub username: String,
    pub name: Option<String>,
    pub tenant_id: Option<String>,
    pub object_id: Option<String>,
}

/// Tokens held in memory for the active account.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

// Keep secrets out of logs.
impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of an interactive sign-in.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub account: Account,
    pub tokens: TokenSet,
}

/// Instructions the operator needs to complete a device code sign-in.
#[derive(Debug, Clone)]
pub struct DeviceCodeChallenge {
    pub user_code: String,
    pub verification_uri: String,
    /// Human readable instructions from the provider.
    pub message: Option<String>,
    device_code: String,
    pub expires_in: u64,
    pub interval: Option<u64>,
}

/// Sink for everything the provider needs to tell the operator.
pub trait DeviceCodePrompt: Send + Sync {
    /// Shows the code and the URI to visit.
    fn show_challenge(&self, challenge: &DeviceCodeChallenge);
    /// Shows where to end the browser session after logout.
    fn show_sign_out(&self, url: &str);
}

/// Delegated authentication backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Interactive sign-in requesting `scopes`.
    async fn sign_in(&self, scopes: &[&str]) -> Result<SignIn, AuthError>;

    /// Silent token acquisition from a refresh token.
    async fn refresh(&self, refresh_token: &str, scopes: &[&str]) -> Result<TokenSet, AuthError>;

    /// Ends the interactive session of `account`.
    async fn sign_out(&self, account: &Account) -> Result<(), AuthError>;
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    user_code: String,
    device_code: String,
    verification_uri: String,
    #[serde(default)]
    message: Option<String>,
    expires_in: u64,
    #[serde(default)]
    interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    upn: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tid: Option<String>,
    #[serde(default)]
    oid: Option<String>,
}

/// Microsoft identity platform, device authorization grant.
pub struct MicrosoftIdentity {
    http: Client,
    client_id: String,
    authority: String,
    prompt: Box<dyn DeviceCodePrompt>,
}

impl MicrosoftIdentity {
    pub fn new(config: &AppConfig, http: Client, prompt: Box<dyn DeviceCodePrompt>) -> Self {
        Self {
            http,
            client_id: config.client_id().to_owned(),
            authority: config.authority(),
            prompt,
        }
    }

    fn device_code_url(&self) -> String {
        format!("{}/oauth2/v2.0/devicecode", self.authority)
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority)
    }

    fn sign_out_url(&self) -> String {
        format!("{}/oauth2/v2.0/logout", self.authority)
    }

    async fn request_device_code(&self, scope: &str) -> Result<DeviceCodeChallenge, AuthError> {
        let response = self
            .http
            .post(self.device_code_url())
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope)])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.message))?;

        if !response.is_success() {
            return Err(provider_error(&response));
        }

        let body: DeviceCodeResponse = response.json().map_err(|e| AuthError::Provider {
            code: "invalid_response".to_owned(),
            description: e.to_string(),
        })?;

        Ok(DeviceCodeChallenge {
            user_code: body.user_code,
            verification_uri: body.verification_uri,
            message: body.message,
            device_code: body.device_code,
            expires_in: body.expires_in,
            interval: body.interval,
        })
    }

    async fn poll_device_token(
        &self,
        challenge: &DeviceCodeChallenge,
    ) -> Result<TokenResponse, AuthError> {
        let mut interval = challenge.interval.unwrap_or(SLOW_DOWN_STEP);
        let deadline = Utc::now() + seconds(i64::try_from(challenge.expires_in).unwrap_or(0));

        loop {
            let response = self
                .http
                .post(self.token_url())
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", challenge.device_code.as_str()),
                ])
                .send()
                .await
                .map_err(|e| AuthError::Transport(e.message))?;

            if response.is_success() {
                return parse_token_response(&response);
            }

            match token_error(&response) {
                Some(err) if err.error == "authorization_pending" => {}
                Some(err) if err.error == "slow_down" => interval += SLOW_DOWN_STEP,
                Some(err) if err.error == "authorization_declined" => {
                    return Err(AuthError::Declined);
                }
                Some(err) if err.error == "expired_token" => return Err(AuthError::Expired),
                _ => return Err(provider_error(&response)),
            }

            if Utc::now() >= deadline {
                return Err(AuthError::Expired);
            }
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }
}

#[async_trait]
impl IdentityProvider for MicrosoftIdentity {
    async fn sign_in(&self, scopes: &[&str]) -> Result<SignIn, AuthError> {
        let scope = scopes.join(" ");
        let challenge = self.request_device_code(&scope).await?;
        self.prompt.show_challenge(&challenge);

        let token = self.poll_device_token(&challenge).await?;
        let id_token = token.id_token.as_deref().ok_or_else(|| {
            AuthError::InvalidIdToken("token response has no id_token".to_owned())
        })?;
        let account = decode_account(id_token)?;
        info!("Signed in as {}", account.username);

        Ok(SignIn {
            account,
            tokens: token_set(token),
        })
    }

    async fn refresh(&self, refresh_token: &str, scopes: &[&str]) -> Result<TokenSet, AuthError> {
        let scope = scopes.join(" ");
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.message))?;

        if response.is_success() {
            return parse_token_response(&response).map(token_set);
        }

        match token_error(&response) {
            Some(err) if matches!(err.error.as_str(), "invalid_grant" | "interaction_required") => {
                warn!(
                    "Silent token acquisition rejected: {}",
                    err.error_description.as_deref().unwrap_or(&err.error)
                );
                Err(AuthError::InteractionRequired)
            }
            _ => Err(provider_error(&response)),
        }
    }

    async fn sign_out(&self, account: &Account) -> Result<(), AuthError> {
        info!("Signing out {}", account.username);
        self.prompt.show_sign_out(&self.sign_out_url());
        Ok(())
    }
}

fn seconds(value: i64) -> TimeDelta {
    TimeDelta::try_seconds(value).unwrap_or_else(TimeDelta::zero)
}

fn token_set(token: TokenResponse) -> TokenSet {
    TokenSet {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: Utc::now() + seconds(token.expires_in),
    }
}

fn parse_token_response(response: &Response) -> Result<TokenResponse, AuthError> {
    response.json().map_err(|e| AuthError::Provider {
        code: "invalid_response".to_owned(),
        description: e.to_string(),
    })
}

fn token_error(response: &Response) -> Option<TokenErrorResponse> {
    response.json::<TokenErrorResponse>().ok()
}

fn provider_error(response: &Response) -> AuthError {
    match token_error(response) {
        Some(err) => AuthError::Provider {
            description: err.error_description.unwrap_or_default(),
            code: err.error,
        },
        None => AuthError::Provider {
            code: response.status.to_string(),
            description: response.text(),
        },
    }
}

/// Reads the account out of an ID token.
///
/// The signature is not checked: the token was just received from the
/// token endpoint over TLS and is only used for display.
pub fn decode_account(id_token: &str) -> Result<Account, AuthError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<IdTokenClaims>(
        id_token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )
    .map_err(|e| AuthError::InvalidIdToken(e.to_string()))?;

    let claims = data.claims;
    let username = claims
        .preferred_username
        .or(claims.upn)
        .ok_or_else(|| AuthError::InvalidIdToken("no preferred_username claim".to_owned()))?;

    Ok(Account {
        username,
        name: claims.name,
        tenant_id: claims.tid,
        object_id: claims.oid,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use jsonwebtoken::{EncodingKey, Header};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Records what the provider asked the operator to do.
    #[derive(Default, Clone)]
    pub(crate) struct RecordingPrompt {
        pub(crate) codes: Arc<Mutex<Vec<String>>>,
        pub(crate) sign_outs: Arc<Mutex<Vec<String>>>,
    }

    impl DeviceCodePrompt for RecordingPrompt {
        fn show_challenge(&self, challenge: &DeviceCodeChallenge) {
            if let Ok(mut codes) = self.codes.lock() {
                codes.push(challenge.user_code.clone());
            }
        }

        fn show_sign_out(&self, url: &str) {
            if let Ok(mut urls) = self.sign_outs.lock() {
                urls.push(url.to_owned());
            }
        }
    }

    pub(crate) fn id_token(username: &str) -> String {
        let claims = serde_json::json!({
            "preferred_username": username,
            "name": "Test Admin",
            "tid": "tenant-1",
            "oid": "object-1",
        });
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encode id token")
    }

    fn provider(server: &MockServer, prompt: RecordingPrompt) -> MicrosoftIdentity {
        let config = AppConfig::new_for_test(&server.uri());
        MicrosoftIdentity::new(&config, Client::new(), Box::new(prompt))
    }

    async fn mock_device_code(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/devicecode"))
            .and(body_string_contains("client_id=test-client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user_code": "ABCD-1234",
                "device_code": "device-xyz",
                "verification_uri": "https://microsoft.com/devicelogin",
                "message": "To sign in, use a web browser",
                "expires_in": 900,
                "interval": 0
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn decode_account_reads_claims() {
        let account = decode_account(&id_token("admin@contoso.com")).expect("decodes");
        assert_eq!(account.username, "admin@contoso.com");
        assert_eq!(account.name.as_deref(), Some("Test Admin"));
        assert_eq!(account.tenant_id.as_deref(), Some("tenant-1"));
        assert_eq!(account.object_id.as_deref(), Some("object-1"));
    }

    #[test]
    fn decode_account_rejects_garbage() {
        assert!(matches!(
            decode_account("not-a-jwt"),
            Err(AuthError::InvalidIdToken(_))
        ));
    }

    #[test]
    fn token_set_debug_redacts_secrets() {
        let tokens = TokenSet {
            access_token: "secret-access".to_owned(),
            refresh_token: Some("secret-refresh".to_owned()),
            expires_at: Utc::now(),
        };
        let debug = format!("{tokens:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[tokio::test]
    async fn device_code_sign_in_polls_until_authorized() {
        let server = MockServer::start().await;
        mock_device_code(&server).await;

        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("device_code=device-xyz"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_pending",
                "error_description": "waiting"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "id_token": id_token("admin@contoso.com"),
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let prompt = RecordingPrompt::default();
        let identity = provider(&server, prompt.clone());

        let sign_in = identity
            .sign_in(&["User.Read.All"])
            .await
            .expect("sign in should succeed");

        assert_eq!(sign_in.account.username, "admin@contoso.com");
        assert_eq!(sign_in.tokens.access_token, "access-1");
        assert_eq!(sign_in.tokens.refresh_token.as_deref(), Some("refresh-1"));
        assert!(sign_in.tokens.expires_at > Utc::now());
        assert_eq!(
            prompt.codes.lock().expect("lock").as_slice(),
            ["ABCD-1234".to_owned()]
        );
    }

    #[tokio::test]
    async fn device_code_declined_maps_to_declined() {
        let server = MockServer::start().await;
        mock_device_code(&server).await;

        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_declined"
            })))
            .mount(&server)
            .await;

        let identity = provider(&server, RecordingPrompt::default());
        let result = identity.sign_in(&["User.Read.All"]).await;
        assert!(matches!(result, Err(AuthError::Declined)));
    }

    #[tokio::test]
    async fn device_code_request_failure_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "unknown application"
            })))
            .mount(&server)
            .await;

        let identity = provider(&server, RecordingPrompt::default());
        match identity.sign_in(&["User.Read.All"]).await {
            Err(AuthError::Provider { code, description }) => {
                assert_eq!(code, "invalid_client");
                assert_eq!(description, "unknown application");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_invalid_grant_requires_interaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "AADSTS70008: expired"
            })))
            .mount(&server)
            .await;

        let identity = provider(&server, RecordingPrompt::default());
        let result = identity.refresh("old", &["User.Read.All"]).await;
        assert!(matches!(result, Err(AuthError::InteractionRequired)));
    }

    #[tokio::test]
    async fn refresh_returns_new_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("refresh_token=old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-2",
                "refresh_token": "refresh-2",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let identity = provider(&server, RecordingPrompt::default());
        let tokens = identity
            .refresh("old", &["User.Read.All"])
            .await
            .expect("refresh should succeed");
        assert_eq!(tokens.access_token, "access-2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn sign_out_shows_logout_url() {
        let server = MockServer::start().await;
        let prompt = RecordingPrompt::default();
        let identity = provider(&server, prompt.clone());
        let account = decode_account(&id_token("admin@contoso.com")).expect("decodes");

        identity.sign_out(&account).await.expect("sign out");

        let urls = prompt.sign_outs.lock().expect("lock").clone();
        assert_eq!(
            urls,
            vec![format!("{}/test-tenant/oauth2/v2.0/logout", server.uri())]
        );
    }
}
