//! Directory API (Microsoft Graph) client.

use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::http::{Client, Method};
use crate::session::AuthSession;
use crate::users::{USER_SELECT_FIELDS, UserRecord, UsersPage};

/// Scopes every directory API call is made with.
pub const GRAPH_SCOPES: &[&str] = &["User.Read.All", "Directory.Read.All", "Mail.Send"];

pub struct GraphClient {
    http: Client,
    base_url: String,
}

impl GraphClient {
    pub fn new(config: &AppConfig, http: Client) -> Self {
        Self {
            http,
            base_url: config.graph_base_url().to_owned(),
        }
    }

    /// Authenticated call to `{base_url}{endpoint}`.
    ///
    /// Returns the parsed body for JSON responses and `{}` for anything else.
    pub async fn call(
        &self,
        session: &mut AuthSession,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> AppResult<Value> {
        if session.active_account().is_none() {
            return Err(AppError::Precondition);
        }
        let token = session.acquire_token(GRAPH_SCOPES).await?;

        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self.http.request(method, url).bearer(&token);
        if let Some(body) = body {
            request = request
                .json(body)
                .map_err(|e| AppError::Decode(e.to_string()))?;
        }

        let response = request.send().await.map_err(|e| {
            error!("Error calling {} {endpoint}: {e}", method.as_str());
            AppError::Transport(e.message)
        })?;

        if !response.is_success() {
            let body = response.text();
            error!("Graph API Error ({}): {body}", response.status);
            return Err(AppError::Api {
                status: response.status,
                status_text: response.status_text,
                body,
            });
        }

        if response.is_json() {
            response.json().map_err(|e| AppError::Decode(e.to_string()))
        } else {
            Ok(Value::Object(serde_json::Map::new()))
        }
    }

    /// Users created at or after `since`, first page only.
    pub async fn recent_users(
        &self,
        session: &mut AuthSession,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<UserRecord>> {
        let endpoint = recent_users_endpoint(since);
        let value = self.call(session, &endpoint, Method::Get, None).await?;
        let page: UsersPage =
            serde_json::from_value(value).map_err(|e| AppError::Decode(e.to_string()))?;

        if page.next_link.is_some() {
            warn!(
                "Directory returned more than one page; only the first {} users are used",
                page.value.len()
            );
        }
        info!("Fetched {} recently created users", page.value.len());
        Ok(page.value)
    }

    /// `POST /me/sendMail`
    pub async fn send_mail(
        &self,
        session: &mut AuthSession,
        request: &SendMailRequest,
    ) -> AppResult<()> {
        let body = serde_json::to_value(request).map_err(|e| AppError::Decode(e.to_string()))?;
        self.call(session, "/me/sendMail", Method::Post, Some(&body))
            .await?;
        Ok(())
    }
}

/// `/users?$filter=createdDateTime ge {since}&$select=...`
pub fn recent_users_endpoint(since: DateTime<Utc>) -> String {
    format!(
        "/users?$filter=createdDateTime ge {}&$select={}",
        since.to_rfc3339_opts(SecondsFormat::Millis, true),
        USER_SELECT_FIELDS.join(",")
    )
}

/// Body of `POST /me/sendMail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMailRequest {
    pub message: MailMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub subject: String,
    pub body: MailBody,
    pub to_recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailBody {
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    pub address: String,
}

impl SendMailRequest {
    /// HTML message to a single recipient.
    pub fn html(subject: &str, html: String, to: &str) -> Self {
        Self {
            message: MailMessage {
                subject: subject.to_owned(),
                body: MailBody {
                    content_type: "HTML".to_owned(),
                    content: html,
                },
                to_recipients: vec![Recipient {
                    email_address: EmailAddress {
                        address: to.to_owned(),
                    },
                }],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::test_utils::TestContext;

    #[test]
    fn recent_users_endpoint_formats_filter_and_select() {
        let since = Utc
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .single()
            .expect("valid date");
        assert_eq!(
            recent_users_endpoint(since),
            "/users?$filter=createdDateTime ge 2024-01-02T03:04:05.000Z\
             &$select=displayName,userPrincipalName,mail,department,assignedLicenses,createdDateTime"
        );
    }

    #[test]
    fn send_mail_request_serializes_graph_shape() {
        let request = SendMailRequest::html("Subject", "<table></table>".to_owned(), "a@x.com");
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "message": {
                    "subject": "Subject",
                    "body": { "contentType": "HTML", "content": "<table></table>" },
                    "toRecipients": [ { "emailAddress": { "address": "a@x.com" } } ]
                }
            })
        );
    }

    #[tokio::test]
    async fn call_without_session_fails_before_token_acquisition() {
        let mut ctx = TestContext::new().await;

        let (graph, session) = ctx.app.graph_and_session();
        let result = graph.call(session, "/users", Method::Get, None).await;

        assert!(matches!(result, Err(AppError::Precondition)));
        assert_eq!(ctx.identity.sign_in_calls(), 0);
        assert_eq!(ctx.identity.refresh_calls(), 0);
        assert!(ctx.received_requests().await.is_empty());
    }

    #[tokio::test]
    async fn call_returns_json_body_with_bearer_token() {
        let mut ctx = TestContext::new().await;
        ctx.login().await;

        Mock::given(method("GET"))
            .and(path("/organization"))
            .and(header("Authorization", "Bearer test_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "value": [ { "id": "org" } ] })),
            )
            .mount(&ctx.mock_server)
            .await;

        let (graph, session) = ctx.app.graph_and_session();
        let value = graph
            .call(session, "/organization", Method::Get, None)
            .await
            .expect("call should succeed");

        assert_eq!(value["value"][0]["id"], "org");
    }

    #[tokio::test]
    async fn call_without_json_content_returns_empty_object() {
        let mut ctx = TestContext::new().await;
        ctx.login().await;

        Mock::given(method("POST"))
            .and(path("/me/sendMail"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&ctx.mock_server)
            .await;

        let body = serde_json::json!({ "message": {} });
        let (graph, session) = ctx.app.graph_and_session();
        let value = graph
            .call(session, "/me/sendMail", Method::Post, Some(&body))
            .await
            .expect("call should succeed");

        assert_eq!(value, serde_json::json!({}));
    }

    #[tokio::test]
    async fn non_success_status_becomes_api_error() {
        let mut ctx = TestContext::new().await;
        ctx.login().await;

        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string(r#"{"error":{"code":"Authorization_RequestDenied"}}"#),
            )
            .mount(&ctx.mock_server)
            .await;

        let (graph, session) = ctx.app.graph_and_session();
        match graph.call(session, "/users", Method::Get, None).await {
            Err(AppError::Api {
                status,
                status_text,
                body,
            }) => {
                assert_eq!(status, 403);
                assert_eq!(status_text, "Forbidden");
                assert!(body.contains("Authorization_RequestDenied"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_decode_error() {
        let mut ctx = TestContext::new().await;
        ctx.login().await;

        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{not json", "application/json"),
            )
            .mount(&ctx.mock_server)
            .await;

        let (graph, session) = ctx.app.graph_and_session();
        let result = graph.call(session, "/users", Method::Get, None).await;
        assert!(matches!(result, Err(AppError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_api_is_transport_error() {
        let mut ctx = TestContext::with_graph_base_url("http://127.0.0.1:9").await;
        ctx.login().await;

        let (graph, session) = ctx.app.graph_and_session();
        let result = graph.call(session, "/users", Method::Get, None).await;
        assert!(matches!(result, Err(AppError::Transport(_))));
    }

    #[tokio::test]
    async fn recent_users_queries_filter_and_select() {
        let mut ctx = TestContext::new().await;
        ctx.login().await;

        Mock::given(method("GET"))
            .and(path("/users"))
            .and(query_param(
                "$select",
                "displayName,userPrincipalName,mail,department,assignedLicenses,createdDateTime",
            ))
            .and(query_param(
                "$filter",
                "createdDateTime ge 2024-01-01T00:00:00.000Z",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [ { "displayName": "Alice", "assignedLicenses": [] } ]
            })))
            .mount(&ctx.mock_server)
            .await;

        let since = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid date");
        let (graph, session) = ctx.app.graph_and_session();
        let users = graph
            .recent_users(session, since)
            .await
            .expect("fetch should succeed");

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].display_name.as_deref(), Some("Alice"));
    }
}
