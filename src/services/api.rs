use crate::config::ApiSettings;
use crate::models::ErrorResponse;
use async_trait::async_trait;
use reqwest::{header, Client, Method, Url};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure classes surfaced by the API client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// No response was received
    Network,
    /// Non-success status
    Server,
    /// Response body was not valid JSON
    Parse,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::Network => "network error",
            ApiErrorKind::Server => "server error",
            ApiErrorKind::Parse => "invalid response",
        };
        f.write_str(name)
    }
}

/// Uniform error returned by every backend call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Server,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: message.into(),
        }
    }
}

/// Errors raised while constructing an [`ApiClient`]
///
/// These are configuration problems; no request has been attempted.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid API base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("Failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Request/response access to the registry backend
///
/// Workflows depend on this trait rather than on [`ApiClient`] directly.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Issue one request and return the parsed JSON body
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError>;
}

/// Registry API client
///
/// Issues JSON requests against a fixed base endpoint. No retries are
/// performed: a failed attempt goes straight back to the caller.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    /// Create a new client; `timeout` of `None` waits indefinitely
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let base_url = base_url.into();
        let valid = Url::parse(&base_url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid {
            return Err(ClientError::InvalidBaseUrl(base_url));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build()?;

        Ok(Self { base_url, client })
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self, ClientError> {
        Self::new(
            settings.base_url.clone(),
            settings.timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = self.url_for(path);
        let request_id = uuid::Uuid::new_v4();

        tracing::debug!("[{}] {} {}", request_id, method, url);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(header::ACCEPT, "application/json");

        if let Some(body) = body {
            // `json` also declares the content type
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("[{}] {} {} failed: {}", request_id, method, url, e);
            ApiError::network(e.to_string())
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::warn!("[{}] Failed to read response body: {}", request_id, e);
            ApiError::network(format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            tracing::warn!("[{}] {} {} returned {}", request_id, method, url, status);
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("request failed with status {}", status.as_u16()));
            return Err(ApiError::server(message));
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| {
            tracing::warn!("[{}] Invalid JSON from {}: {}", request_id, url, e);
            ApiError::parse(format!("Invalid JSON response: {}", e))
        })?;

        tracing::debug!("[{}] {} {} -> {}", request_id, method, url, status);

        Ok(json)
    }
}
