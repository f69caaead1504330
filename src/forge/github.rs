//! forge::github
//!
//! GitHub REST transport.
//!
//! # Design
//!
//! [`GitHubTransport`] implements [`Transport`] over `reqwest`. It owns URL
//! construction, common headers and status mapping; it knows nothing about
//! the git data model. Failed requests are never retried.
//!
//! # Example
//!
//! ```ignore
//! use ghtree::auth::Credentials;
//! use ghtree::forge::github::GitHubTransport;
//! use ghtree::forge::{ApiRequest, Transport};
//!
//! let transport = GitHubTransport::new(Credentials::Token("ghp_xxx".into()));
//! let response = transport
//!     .send(ApiRequest::get("/repos/octocat/hello-world/git/refs/heads/main"))
//!     .await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::traits::{ApiRequest, ApiResponse, ForgeError, Method, Transport};
use crate::auth::Credentials;

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "ghtree";

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// GitHub transport.
pub struct GitHubTransport {
    /// HTTP client for making requests
    client: Client,
    credentials: Credentials,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing credentials
impl std::fmt::Debug for GitHubTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubTransport")
            .field("authenticated", &!self.credentials.is_anonymous())
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubTransport {
    /// Create a transport against `api.github.com`.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_api_base(credentials, DEFAULT_API_BASE)
    }

    /// Create a transport against a custom API base URL.
    ///
    /// Use this for GitHub Enterprise (e.g., `https://github.example.com/api/v3`)
    /// or a local mock server.
    pub fn with_api_base(credentials: Credentials, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            credentials,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::InvalidRequest` if the HTTP client cannot be built.
    pub fn with_timeout(
        credentials: Credentials,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ForgeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForgeError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            client,
            credentials,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Resolve a request path to a full URL.
    ///
    /// `http(s)://` paths are already absolute (pagination links).
    fn url_for(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.api_base, path)
        } else {
            format!("{}/{}", self.api_base, path)
        }
    }

    /// Build common headers for API requests.
    fn headers(&self, raw: bool) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();
        if let Some(value) = self.credentials.authorization() {
            let value = HeaderValue::from_str(&value)
                .map_err(|_| ForgeError::InvalidRequest("credentials are not a valid header".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(if raw { RAW_MEDIA_TYPE } else { JSON_MEDIA_TYPE }),
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Whether a status counts as success (2xx, or 304 Not Modified).
pub(crate) fn is_success(status: u16) -> bool {
    (200..300).contains(&status) || status == 304
}

/// Pull the `message` field out of a GitHub error body.
fn error_message(body: &[u8], status: StatusCode) -> String {
    match serde_json::from_slice::<GitHubErrorResponse>(body) {
        Ok(err) => err.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    }
}

#[async_trait]
impl Transport for GitHubTransport {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ForgeError> {
        let url = self.url_for(&request.path);

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url)
            .headers(self.headers(request.raw)?);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ForgeError::Network(e.to_string()))?;

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| ForgeError::Network(e.to_string()))?
            .to_vec();

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "api request"
        );

        if !is_success(status.as_u16()) {
            return Err(ForgeError::Status {
                status: status.as_u16(),
                path: request.path,
                message: error_message(&body, status),
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

// --------------------------------------------------------------------------
// URL Parsing
// --------------------------------------------------------------------------

/// Parse a GitHub remote URL to extract owner and repo.
///
/// Supports both SSH and HTTPS formats:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo.git`
/// - `https://github.com/owner/repo`
///
/// # Example
///
/// ```
/// use ghtree::forge::github::parse_github_url;
///
/// let (owner, repo) = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    parse_slug(rest.strip_suffix(".git").unwrap_or(rest))
}

/// Parse an `owner/repo` slug.
///
/// ```
/// use ghtree::forge::github::parse_slug;
///
/// assert_eq!(
///     parse_slug("octocat/hello-world"),
///     Some(("octocat".to_string(), "hello-world".to_string()))
/// );
/// assert!(parse_slug("octocat").is_none());
/// ```
pub fn parse_slug(slug: &str) -> Option<(String, String)> {
    let (owner, repo) = slug.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
