//! forge
//!
//! Transport to the remote hosting API.
//!
//! # Architecture
//!
//! The [`Transport`] trait performs one request/response exchange. The
//! repository layer ([`crate::repo`]) sequences exchanges into git data
//! operations and never talks to `reqwest` directly.
//!
//! # Modules
//!
//! - `traits`: `Transport` trait, request/response and error types
//! - [`github`]: GitHub REST implementation over `reqwest`
//! - [`mock`]: In-memory implementation for deterministic testing
//! - `pagination`: `Link: rel="next"` traversal for list endpoints
//!
//! # Example
//!
//! ```ignore
//! use ghtree::auth::Credentials;
//! use ghtree::forge::github::GitHubTransport;
//! use ghtree::forge::request_all_pages;
//!
//! let transport = GitHubTransport::new(Credentials::Token(token));
//! let heads: Vec<serde_json::Value> =
//!     request_all_pages(&transport, "/repos/octocat/hello/git/refs/heads").await?;
//! ```

pub mod github;
pub mod mock;
mod pagination;
mod traits;

pub use pagination::{next_page_link, request_all_pages};
pub use traits::*;
