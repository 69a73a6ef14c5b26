//! REST plumbing shared by the hosting-provider creators
//!
//! This module provides:
//! - Authentication per provider (token header, bearer, basic)
//! - Mapping of HTTP statuses to typed `ProviderError`s
//! - Error message extraction from provider JSON bodies

use crate::domain::{Credential, Provider};
use crate::error::ProviderError;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("depbot/", env!("CARGO_PKG_VERSION"));

/// Longest response excerpt kept in an error message
const MAX_MESSAGE_LEN: usize = 500;

/// How a provider expects credentials to be sent
#[derive(Clone)]
pub enum Auth {
    /// A raw header, e.g. `Authorization: token abc` or `PRIVATE-TOKEN: abc`
    Header { name: &'static str, value: String },
    Basic {
        username: String,
        password: Option<String>,
    },
    Anonymous,
}

impl Auth {
    pub fn github(credential: Option<&Credential>) -> Self {
        match credential.and_then(|c| c.token.clone()) {
            Some(token) => Auth::Header {
                name: "Authorization",
                value: format!("token {}", token),
            },
            None => Auth::Anonymous,
        }
    }

    pub fn gitlab(credential: Option<&Credential>) -> Self {
        match credential.and_then(|c| c.token.clone()) {
            Some(token) => Auth::Header {
                name: "PRIVATE-TOKEN",
                value: token,
            },
            None => Auth::Anonymous,
        }
    }

    /// Azure personal access tokens go in as a basic-auth password
    pub fn azure(credential: Option<&Credential>) -> Self {
        match credential {
            Some(Credential {
                token: Some(token), ..
            }) => Auth::Basic {
                username: String::new(),
                password: Some(token.clone()),
            },
            Some(Credential {
                username: Some(username),
                password,
                ..
            }) => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Auth::Anonymous,
        }
    }

    pub fn bitbucket_server(credential: Option<&Credential>) -> Self {
        match credential {
            Some(Credential {
                token: Some(token), ..
            }) => Auth::Header {
                name: "Authorization",
                value: format!("Bearer {}", token),
            },
            Some(Credential {
                username: Some(username),
                password,
                ..
            }) => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Auth::Anonymous,
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::Header { name, value } => request.header(*name, value),
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Auth::Anonymous => request,
        }
    }
}

/// A response whose status has not been judged yet
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json_value(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Human readable error text from the body
    pub fn message(&self) -> String {
        match self.json_value() {
            Some(value) => extract_message(&value).unwrap_or_else(|| truncate(&self.body)),
            None => truncate(&self.body),
        }
    }

    /// GitHub validation error codes, e.g. `already_exists`
    pub fn error_codes(&self) -> Vec<String> {
        self.json_value()
            .and_then(|v| v.get("errors").cloned())
            .and_then(|e| e.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(|e| e.get("code").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

fn extract_message(value: &Value) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(message) = value.get("message") {
        match message {
            Value::String(s) => parts.push(s.clone()),
            other => parts.push(other.to_string()),
        }
    }
    if let Some(errors) = value.get("errors").and_then(Value::as_array) {
        for error in errors {
            match error {
                Value::String(s) => parts.push(s.clone()),
                other => {
                    if let Some(message) = other.get("message").and_then(Value::as_str) {
                        parts.push(message.to_string());
                    } else if let Some(code) = other.get("code").and_then(Value::as_str) {
                        parts.push(format!("code: {}", code));
                    }
                }
            }
        }
    }
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        parts.push(error.to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Authenticated JSON client rooted at one API base URL
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    provider: Provider,
    repo: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(
        provider: Provider,
        base_url: impl Into<String>,
        repo: impl Into<String>,
        auth: Auth,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Misconfigured {
                provider: provider.to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider,
            repo: repo.into(),
            auth,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        if path.starts_with('/') || path.starts_with('?') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// An authenticated request builder for `path`
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.auth.apply(self.client.request(method, self.url(path)))
    }

    /// Send a request; any HTTP status is returned, only transport failures are errors
    pub async fn send(&self, request: RequestBuilder) -> Result<ApiResponse, ProviderError> {
        let response = request.send().await.map_err(|e| ProviderError::Transient {
            provider: self.provider.to_string(),
            message: if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            },
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| ProviderError::Transient {
            provider: self.provider.to_string(),
            message: e.to_string(),
        })?;
        debug!(provider = %self.provider, status = status.as_u16(), "API response");
        Ok(ApiResponse { status, body })
    }

    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ProviderError> {
        let request = self.request(method, path);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        self.send(request).await
    }

    /// Map a non-success response to a typed error
    pub fn check(&self, response: ApiResponse) -> Result<ApiResponse, ProviderError> {
        if response.is_success() {
            return Ok(response);
        }
        Err(self.error_for(&response))
    }

    pub fn error_for(&self, response: &ApiResponse) -> ProviderError {
        status_error(self.provider, &self.repo, response.status, response.message())
    }

    pub fn parse<T: DeserializeOwned>(&self, response: &ApiResponse) -> Result<T, ProviderError> {
        serde_json::from_str(&response.body).map_err(|e| {
            ProviderError::invalid_response(self.provider.to_string(), e.to_string())
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let response = self.execute(Method::GET, path, None).await?;
        let response = self.check(response)?;
        self.parse(&response)
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ProviderError> {
        let response = self.execute(Method::POST, path, Some(body)).await?;
        let response = self.check(response)?;
        self.parse(&response)
    }
}

/// Typed error for an HTTP failure status
pub fn status_error(provider: Provider, repo: &str, status: StatusCode, message: String) -> ProviderError {
    let provider_name = provider.to_string();
    match status {
        StatusCode::UNAUTHORIZED => ProviderError::Unauthorized {
            provider: provider_name,
            message,
        },
        StatusCode::FORBIDDEN => {
            let lower = message.to_lowercase();
            if lower.contains("secondary rate limit") || lower.contains("abuse") {
                ProviderError::Transient {
                    provider: provider_name,
                    message,
                }
            } else if lower.contains("disabled") {
                ProviderError::RepoDisabled {
                    repo: repo.to_string(),
                }
            } else if lower.contains("archived") {
                ProviderError::RepoArchived {
                    repo: repo.to_string(),
                }
            } else {
                ProviderError::Forbidden {
                    provider: provider_name,
                    message,
                }
            }
        }
        StatusCode::NOT_FOUND => ProviderError::RepoNotFound {
            repo: repo.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::Transient {
            provider: provider_name,
            message,
        },
        s if s.is_server_error() => ProviderError::Transient {
            provider: provider_name,
            message: format!("HTTP {}: {}", s.as_u16(), message),
        },
        s => ProviderError::api(provider_name, s.as_u16(), message),
    }
}
