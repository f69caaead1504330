//! forge::traits
//!
//! Transport trait and request/response types for the hosting API.
//!
//! # Design
//!
//! The `Transport` trait is async because every call is network I/O. It
//! performs exactly one request/response exchange; sequencing lives in
//! [`crate::repo`]. Implementations map any status outside `200..=299`
//! (other than 304) to [`ForgeError::Status`].
//!
//! # Example
//!
//! ```ignore
//! use ghtree::forge::{ApiRequest, Transport};
//!
//! async fn tip(transport: &dyn Transport) -> Result<(), ForgeError> {
//!     let response = transport
//!         .send(ApiRequest::get("/repos/octocat/hello/git/refs/heads/main"))
//!         .await?;
//!     println!("{}", response.status);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::types::{BranchName, Oid};

/// Errors from forge operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForgeError {
    /// The remote answered with a non-success status.
    #[error("request to {path} failed with status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Request path that failed
        path: String,
        /// Error message from the API body, if any
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// The response body did not have the expected shape.
    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    /// The branch moved between resolving its tip and updating it.
    #[error("branch '{branch}' moved: expected {expected}, found {actual}")]
    Conflict {
        branch: BranchName,
        expected: Oid,
        actual: Oid,
    },

    /// A recursive tree listing was cut short by the remote. A partial
    /// listing cannot stand in for the whole tree.
    #[error("tree listing for {tree_ish} was truncated after {entries} entries")]
    Truncated { tree_ish: String, entries: usize },

    /// A request could not be built (bad header value, invalid URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ForgeError {
    /// HTTP status, when the failure came from the remote.
    pub fn status(&self) -> Option<u16> {
        match self {
            ForgeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// HTTP method subset used by the hosting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Patch => write!(f, "PATCH"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single request to the hosting API.
///
/// `path` is relative to the API root unless it starts with `http://` or
/// `https://` (pagination links are absolute).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Ask for the raw payload instead of the JSON representation.
    pub raw: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            raw: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Request the raw media type.
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }
}

/// A successful response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are stored lowercase.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Look up a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decode the body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::Decode` naming `path` if the body does not parse.
    pub fn json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ForgeError> {
        serde_json::from_slice(&self.body).map_err(|e| ForgeError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

/// One request/response exchange with the hosting API.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get the transport name (e.g., "github", "mock").
    fn name(&self) -> &'static str;

    /// Perform the request.
    ///
    /// # Errors
    ///
    /// - `Status` when the remote answers outside `200..=299` and not 304
    /// - `Network` when no response arrives
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ForgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_display() {
        assert_eq!(format!("{}", Method::Get), "GET");
        assert_eq!(format!("{}", Method::Patch), "PATCH");
        assert_eq!(format!("{}", Method::Delete), "DELETE");
    }

    #[test]
    fn request_builders() {
        let req = ApiRequest::post("/x").json(serde_json::json!({"a": 1}));
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.body, Some(serde_json::json!({"a": 1})));
        assert!(!req.raw);
        assert!(ApiRequest::get("/y").raw().raw);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut response = ApiResponse::default();
        response
            .headers
            .insert("link".to_string(), "<x>; rel=\"next\"".to_string());
        assert!(response.header("Link").is_some());
        assert!(response.header("etag").is_none());
    }

    #[test]
    fn json_decode_error_names_path() {
        let response = ApiResponse {
            status: 200,
            headers: HashMap::new(),
            body: b"not json".to_vec(),
        };
        let err = response.json::<serde_json::Value>("/repos/a/b").unwrap_err();
        assert!(matches!(err, ForgeError::Decode { ref path, .. } if path == "/repos/a/b"));
    }

    #[test]
    fn forge_error_display() {
        let err = ForgeError::Status {
            status: 422,
            path: "/repos/o/r/git/refs/heads/main".into(),
            message: "Update is not a fast forward".into(),
        };
        assert_eq!(
            err.to_string(),
            "request to /repos/o/r/git/refs/heads/main failed with status 422: Update is not a fast forward"
        );
        assert_eq!(err.status(), Some(422));
        assert!(!err.is_not_found());
        assert_eq!(
            ForgeError::Network("connection refused".into()).to_string(),
            "network error: connection refused"
        );
    }
}
