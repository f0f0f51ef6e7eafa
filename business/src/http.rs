//! Thin HTTP layer over a shared `reqwest::Client`.
//!
//! Responses are read fully into a plain [`Response`] so callers can inspect
//! status, headers and body without holding on to the connection.

use std::collections::HashMap;

/// HTTP method for requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Canonical reason phrase for `status`, empty when unknown.
    pub status_text: String,
    /// Response headers (lowercased keys)
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    /// Returns true if the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// True when `content-type` declares JSON.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Transport level failure: DNS, connect, TLS, reset.
#[derive(Debug, Clone, thiserror::Error)]
#[error("HTTP error: {message}")]
pub struct HttpError {
    pub message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Raw(Vec<u8>),
    Form(Vec<(String, String)>),
}

/// A builder for constructing HTTP requests.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: reqwest::Client,
    method: Method,
    url: String,
    headers: HashMap<String, String>,
    body: Option<Body>,
}

impl RequestBuilder {
    fn new(client: reqwest::Client, method: Method, url: impl Into<String>) -> Self {
        Self {
            client,
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", format!("Bearer {token}"))
    }

    /// Set the request body as JSON text with a JSON content type.
    pub fn json<T: serde::Serialize + ?Sized>(
        mut self,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        let json_bytes = serde_json::to_vec(value)?;
        self.body = Some(Body::Raw(json_bytes));
        self.headers
            .insert("content-type".to_owned(), "application/json".to_owned());
        Ok(self)
    }

    /// Set an `application/x-www-form-urlencoded` body.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Some(Body::Form(
            fields
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        ));
        self
    }

    pub async fn send(self) -> HttpResult<Response> {
        let mut request = match self.method {
            Method::Get => self.client.get(&self.url),
            Method::Post => self.client.post(&self.url),
        };

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        match self.body {
            Some(Body::Raw(bytes)) => request = request.body(bytes),
            Some(Body::Form(fields)) => request = request.form(&fields),
            None => {}
        }

        let response = request
            .send()
            .await
            .map_err(|e| HttpError::new(e.to_string()))?;

        // Extract status and headers before consuming the response
        let status = response.status();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), v.to_owned());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::new(e.to_string()))?
            .to_vec();

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }
}

/// Cheaply cloneable client; every request goes through the same connection pool.
#[derive(Debug, Clone, Default)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(self.inner.clone(), method, url)
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Get, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Post, url)
    }
}
