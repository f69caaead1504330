//! auth - credentials for the hosting API
//!
//! # Security
//!
//! Secrets MUST never appear in logs, error messages or debug output.
//! [`Credentials`] implements a custom Debug that redacts them.
//!
//! # Example
//!
//! ```
//! use ghtree::auth::Credentials;
//!
//! let creds = Credentials::Token("ghp_secret".to_string());
//! assert_eq!(creds.authorization().unwrap(), "token ghp_secret");
//! assert!(!format!("{:?}", creds).contains("ghp_secret"));
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Unauthenticated requests (public repositories, read-only).
    #[default]
    Anonymous,
    /// Personal access or app token.
    Token(String),
    /// HTTP basic authentication.
    Basic { username: String, password: String },
}

impl Credentials {
    /// Value for the `Authorization` header, if any.
    pub fn authorization(&self) -> Option<String> {
        match self {
            Credentials::Anonymous => None,
            Credentials::Token(token) => Some(format!("token {}", token)),
            Credentials::Basic { username, password } => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{}:{}", username, password))
            )),
        }
    }

    /// The login name, when the credentials carry one.
    pub fn username(&self) -> Option<&str> {
        match self {
            Credentials::Basic { username, .. } => Some(username),
            _ => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Credentials::Anonymous)
    }
}

// Custom Debug to avoid exposing secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::Token(_) => write!(f, "Token([REDACTED])"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_header() {
        assert_eq!(Credentials::Anonymous.authorization(), None);
        assert!(Credentials::default().is_anonymous());
    }

    #[test]
    fn basic_header_is_base64() {
        let creds = Credentials::Basic {
            username: "octocat".into(),
            password: "hunter2".into(),
        };
        // base64("octocat:hunter2")
        assert_eq!(
            creds.authorization().unwrap(),
            "Basic b2N0b2NhdDpodW50ZXIy"
        );
        assert_eq!(creds.username(), Some("octocat"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let token = format!("{:?}", Credentials::Token("secret_abc".into()));
        assert!(!token.contains("secret_abc"));

        let basic = format!(
            "{:?}",
            Credentials::Basic {
                username: "octocat".into(),
                password: "secret_pw".into(),
            }
        );
        assert!(basic.contains("octocat"));
        assert!(!basic.contains("secret_pw"));
    }
}
