//! core::config
//!
//! Configuration loading.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. `GITHUB_TOKEN` environment variable (token only)
//! 4. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order, first existing file wins:
//! 1. `$GHTREE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/ghtree/config.toml`
//! 3. `~/.ghtree/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use ghtree::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("API: {}", config.api_base());
//! println!("Default branch: {}", config.default_branch());
//! ```

pub mod schema;

pub use schema::{AuthConfig, AuthorConfig, ConfigFile};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::auth::Credentials;
use crate::core::types::{Author, BranchName, RefUpdatePolicy};
use crate::forge::github::DEFAULT_API_BASE;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GHTREE_CONFIG";

/// Environment variable carrying an API token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with accessors that apply defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: ConfigFile,
    /// Token from the environment, overriding `auth.token`
    env_token: Option<String>,
    /// Path to the config file (if loaded)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment and default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated. A missing file is not an error.
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok(), dirs::home_dir())
    }

    /// Load configuration with an explicit environment lookup and home dir.
    pub fn load_with<F>(env: F, home: Option<PathBuf>) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (file, path) = match Self::find_file(&env, home.as_deref()) {
            Some(path) => (Self::read_file(&path)?, Some(path)),
            None => (ConfigFile::default(), None),
        };
        file.validate()?;

        let env_token = env(TOKEN_ENV).filter(|t| !t.trim().is_empty());
        if env_token.is_some() {
            tracing::debug!("using token from {}", TOKEN_ENV);
        }

        Ok(Config {
            file,
            env_token,
            path,
        })
    }

    /// Load a specific file, ignoring the search path and environment.
    pub fn from_path(path: &Path) -> Result<Config, ConfigError> {
        let file = Self::read_file(path)?;
        file.validate()?;
        Ok(Config {
            file,
            env_token: None,
            path: Some(path.to_path_buf()),
        })
    }

    fn find_file<F>(env: &F, home: Option<&Path>) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 1. Check $GHTREE_CONFIG
        if let Some(path) = env(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/ghtree/config.toml
        if let Some(xdg_home) = env("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("ghtree/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.ghtree/config.toml
        if let Some(home) = home {
            let path = home.join(".ghtree/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// API root. Defaults to `https://api.github.com`.
    pub fn api_base(&self) -> &str {
        self.file.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// Branch used when none is given. Defaults to `main`.
    pub fn default_branch(&self) -> BranchName {
        self.file
            .default_branch
            .as_deref()
            .and_then(|b| BranchName::new(b).ok())
            .unwrap_or_else(|| BranchName::new("main").expect("'main' is a valid branch name"))
    }

    pub fn ref_update(&self) -> RefUpdatePolicy {
        self.file.ref_update.unwrap_or_default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.file.timeout_secs.map(Duration::from_secs)
    }

    /// Credentials: environment token, then `[auth]`, then anonymous.
    pub fn credentials(&self) -> Credentials {
        if let Some(token) = &self.env_token {
            return Credentials::Token(token.clone());
        }
        match &self.file.auth {
            Some(AuthConfig {
                token: Some(token), ..
            }) => Credentials::Token(token.clone()),
            Some(AuthConfig {
                username: Some(username),
                password: Some(password),
                ..
            }) => Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Credentials::Anonymous,
        }
    }

    pub fn author(&self) -> Option<Author> {
        match &self.file.author {
            Some(AuthorConfig {
                name: Some(name),
                email: Some(email),
            }) => Some(Author::new(name.as_str(), email.as_str())),
            _ => None,
        }
    }

    /// Get the path to the loaded config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn load_empty_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_with(env_of(&[]), Some(temp.path().to_path_buf())).unwrap();

        assert_eq!(config.api_base(), "https://api.github.com");
        assert_eq!(config.default_branch().as_str(), "main");
        assert_eq!(config.ref_update(), RefUpdatePolicy::FastForward);
        assert_eq!(config.timeout(), None);
        assert!(config.credentials().is_anonymous());
        assert!(config.author().is_none());
        assert!(config.loaded_from().is_none());
    }

    #[test]
    fn explicit_path_wins_over_home() {
        let temp = TempDir::new().unwrap();
        let explicit = temp.path().join("explicit.toml");
        fs::write(&explicit, "default_branch = \"explicit\"").unwrap();

        let home = temp.path().join("home");
        fs::create_dir_all(home.join(".ghtree")).unwrap();
        fs::write(home.join(".ghtree/config.toml"), "default_branch = \"home\"").unwrap();

        let env = env_of(&[(CONFIG_ENV, explicit.to_str().unwrap())]);
        let config = Config::load_with(env, Some(home.clone())).unwrap();
        assert_eq!(config.default_branch().as_str(), "explicit");
        assert_eq!(config.loaded_from(), Some(explicit.as_path()));

        let config = Config::load_with(env_of(&[]), Some(home)).unwrap();
        assert_eq!(config.default_branch().as_str(), "home");
    }

    #[test]
    fn xdg_before_home() {
        let temp = TempDir::new().unwrap();
        let xdg = temp.path().join("xdg");
        fs::create_dir_all(xdg.join("ghtree")).unwrap();
        fs::write(xdg.join("ghtree/config.toml"), "timeout_secs = 5").unwrap();

        let env = env_of(&[("XDG_CONFIG_HOME", xdg.to_str().unwrap())]);
        let config = Config::load_with(env, Some(temp.path().to_path_buf())).unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn env_token_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("c.toml");
        fs::write(&path, "[auth]\ntoken = \"from-file\"\n").unwrap();

        let env = env_of(&[(CONFIG_ENV, path.to_str().unwrap()), (TOKEN_ENV, "from-env")]);
        let config = Config::load_with(env, None).unwrap();
        assert_eq!(config.credentials(), Credentials::Token("from-env".into()));

        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.credentials(), Credentials::Token("from-file".into()));
    }

    #[test]
    fn basic_auth_and_author() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("c.toml");
        fs::write(
            &path,
            r#"
            [auth]
            username = "octocat"
            password = "hunter2"

            [author]
            name = "Jane"
            email = "jane@example.com"
            "#,
        )
        .unwrap();

        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.credentials().username(), Some("octocat"));
        assert_eq!(config.author(), Some(Author::new("Jane", "jane@example.com")));
    }

    #[test]
    fn invalid_file_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("c.toml");

        fs::write(&path, "default_branch = \"invalid..name\"").unwrap();
        assert!(matches!(
            Config::from_path(&path),
            Err(ConfigError::InvalidValue(_))
        ));

        fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(
            Config::from_path(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn missing_explicit_path_falls_through() {
        let temp = TempDir::new().unwrap();
        let env = env_of(&[(CONFIG_ENV, "/nonexistent/ghtree.toml")]);
        let config = Config::load_with(env, Some(temp.path().to_path_buf())).unwrap();
        assert!(config.loaded_from().is_none());
    }
}
