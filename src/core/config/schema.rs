//! core::config::schema
//!
//! Configuration file schema.
//!
//! # Validation
//!
//! Values are validated after parsing: the default branch must be a valid
//! branch name, the API base an http(s) URL, and auth either a token or a
//! username/password pair.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::{BranchName, RefUpdatePolicy};

/// Contents of `config.toml`.
///
/// # Example
///
/// ```toml
/// api_base = "https://api.github.com"
/// default_branch = "main"
/// ref_update = "compare-and-swap"
/// timeout_secs = 30
///
/// [auth]
/// token = "ghp_..."
///
/// [author]
/// name = "Jane Doe"
/// email = "jane@example.com"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// API root (default: `https://api.github.com`)
    pub api_base: Option<String>,

    /// Branch used when a command names none (default: `main`)
    pub default_branch: Option<String>,

    /// Ref update policy
    pub ref_update: Option<RefUpdatePolicy>,

    /// Per-request timeout in seconds; unset means no timeout
    pub timeout_secs: Option<u64>,

    pub auth: Option<AuthConfig>,

    /// Commit identity
    pub author: Option<AuthorConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(branch) = &self.default_branch {
            BranchName::new(branch.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default branch: {}", e))
            })?;
        }

        if let Some(base) = &self.api_base {
            if !(base.starts_with("https://") || base.starts_with("http://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "api_base '{}' must be an http(s) URL",
                    base
                )));
            }
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        if let Some(author) = &self.author {
            author.validate()?;
        }

        Ok(())
    }
}

/// `[auth]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.is_some() && (self.username.is_some() || self.password.is_some()) {
            return Err(ConfigError::InvalidValue(
                "auth.token cannot be combined with auth.username/auth.password".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::InvalidValue(
                "auth.username and auth.password must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[author]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuthorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_some() != self.email.is_some() {
            return Err(ConfigError::InvalidValue(
                "author.name and author.email must be set together".to_string(),
            ));
        }
        Ok(())
    }
}
