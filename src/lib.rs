//! ghtree - file-level commits over the GitHub git data API
//!
//! ghtree turns "write this file", "delete that path" and "move this
//! directory" into the blob, tree, commit and ref calls the hosting API
//! needs, without a local clone.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to repo)
//! - [`repo`] - Repository handle: resolve tip → build tree → commit → update ref
//! - [`forge`] - Transport to the hosting API (GitHub, in-memory mock)
//! - [`core`] - Domain types and configuration
//! - [`auth`] - Request credentials
//! - [`telemetry`] - Log subscriber for the binary
//!
//! # Guarantees
//!
//! 1. A mutation either advances the branch by exactly one commit or
//!    returns the error of the stage that failed
//! 2. A handle never interleaves two mutations
//! 3. Under compare-and-swap, a branch that moved is never overwritten

pub mod auth;
pub mod cli;
pub mod core;
pub mod forge;
pub mod repo;
pub mod telemetry;
