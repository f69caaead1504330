//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the repository handle
//! 3. Formats and displays output
//!
//! Handlers write to a caller-supplied writer so they can be exercised
//! against an in-memory forge.
//!
//! # Async Commands
//!
//! Every command performs network I/O. `dispatch` builds one tokio runtime
//! and blocks on the selected handler.

mod files;
mod history;
mod refs;

pub use files::{mv, read, rm, write};
pub use history::log;
pub use refs::{branch, branches, tip};

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};

use crate::cli::args::{Cli, Command};
use crate::core::config::Config;
use crate::core::types::{BranchName, RefUpdatePolicy};
use crate::forge::github::{parse_github_url, parse_slug, GitHubTransport};
use crate::forge::Transport;
use crate::repo::{Repository, RepositorySettings};

/// Resolved state shared by every handler.
#[derive(Debug)]
pub struct Session {
    pub repo: Repository,
    /// Branch selected by `--branch` or configuration.
    pub branch: BranchName,
}

impl Session {
    /// Build a session over `transport` for the repository named on the
    /// command line.
    pub fn open(cli: &Cli, config: &Config, transport: Arc<dyn Transport>) -> Result<Session> {
        let (owner, name) = repository_from_cli(cli)?;

        let branch = match &cli.branch {
            Some(b) => BranchName::new(b.as_str())
                .with_context(|| format!("invalid branch '{}'", b))?,
            None => config.default_branch(),
        };

        let settings = RepositorySettings {
            author: config.author(),
            ref_update: if cli.compare_and_swap {
                RefUpdatePolicy::CompareAndSwap
            } else {
                config.ref_update()
            },
        };

        let repo = Repository::new(transport, owner, name).with_settings(settings);
        Ok(Session { repo, branch })
    }
}

/// `owner/name` from `--repo` or `--remote`.
fn repository_from_cli(cli: &Cli) -> Result<(String, String)> {
    if let Some(slug) = &cli.repo {
        return parse_slug(slug)
            .with_context(|| format!("invalid --repo '{}', expected owner/name", slug));
    }
    if let Some(url) = &cli.remote {
        return parse_github_url(url)
            .with_context(|| format!("'{}' is not a GitHub remote URL", url));
    }
    bail!("no repository given; pass --repo owner/name or --remote URL")
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load()?,
    };
    if let Some(path) = config.loaded_from() {
        tracing::debug!(path = %path.display(), "loaded config");
    }
    Ok(config)
}

fn github_transport(cli: &Cli, config: &Config) -> Result<Arc<dyn Transport>> {
    let api_base = cli.api_base.as_deref().unwrap_or(config.api_base());
    let credentials = config.credentials();
    let transport = match config.timeout() {
        Some(timeout) => GitHubTransport::with_timeout(credentials, api_base, timeout)?,
        None => GitHubTransport::with_api_base(credentials, api_base),
    };
    Ok(Arc::new(transport))
}

/// Dispatch a command to its handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let transport = github_transport(&cli, &config)?;
    let mut session = Session::open(&cli, &config, transport)?;

    let rt = tokio::runtime::Runtime::new()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    rt.block_on(execute(cli.command, &mut session, &mut out))?;
    out.flush()?;
    Ok(())
}

/// Run one command against an open session.
pub async fn execute(command: Command, session: &mut Session, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Read { path } => files::read(session, &path, out).await,
        Command::Write {
            path,
            content,
            file,
            message,
        } => {
            let content = match (content, file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(file)) => std::fs::read(&file)
                    .with_context(|| format!("failed to read '{}'", file.display()))?,
                (None, None) => bail!("either --content or --file is required"),
            };
            files::write(session, &path, content, &message, out).await
        }
        Command::Rm { path, message } => files::rm(session, &path, message.as_deref(), out).await,
        Command::Mv { from, to, message } => {
            files::mv(session, &from, &to, message.as_deref(), out).await
        }
        Command::Tip => refs::tip(session, out).await,
        Command::Branches => refs::branches(session, out).await,
        Command::Branch { name, from } => refs::branch(session, &name, from.as_deref(), out).await,
        Command::Log {
            path,
            since,
            until,
            limit,
        } => history::log(session, path, since, until, limit, out).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::MockForge;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn repository_from_slug_or_remote() {
        assert_eq!(
            repository_from_cli(&cli(&["ghtree", "--repo", "o/r", "tip"])).unwrap(),
            ("o".to_string(), "r".to_string())
        );
        assert_eq!(
            repository_from_cli(&cli(&["ghtree", "--remote", "https://github.com/o/r.git", "tip"]))
                .unwrap(),
            ("o".to_string(), "r".to_string())
        );
        assert!(repository_from_cli(&cli(&["ghtree", "tip"])).is_err());
        assert!(repository_from_cli(&cli(&["ghtree", "--repo", "nope", "tip"])).is_err());
    }

    #[test]
    fn session_applies_flags_over_config() {
        let forge = MockForge::new("o", "r");
        let config = Config::default();
        let session = Session::open(
            &cli(&["ghtree", "--repo", "o/r", "-b", "dev", "--compare-and-swap", "tip"]),
            &config,
            Arc::new(forge),
        )
        .unwrap();

        assert_eq!(session.branch.as_str(), "dev");
        assert_eq!(
            session.repo.settings().ref_update,
            RefUpdatePolicy::CompareAndSwap
        );
        assert_eq!(session.repo.owner(), "o");
    }

    #[test]
    fn session_defaults_branch_from_config() {
        let forge = MockForge::new("o", "r");
        let session = Session::open(
            &cli(&["ghtree", "--repo", "o/r", "tip"]),
            &Config::default(),
            Arc::new(forge),
        )
        .unwrap();
        assert_eq!(session.branch.as_str(), "main");
        assert_eq!(session.repo.settings().ref_update, RefUpdatePolicy::FastForward);
    }

    #[tokio::test]
    async fn execute_write_then_read() {
        let forge = MockForge::new("o", "r");
        forge.seed_commit("main", &[("a.txt", b"a".as_slice())], "init");
        let mut session = Session::open(
            &cli(&["ghtree", "--repo", "o/r", "tip"]),
            &Config::default(),
            Arc::new(forge.clone()),
        )
        .unwrap();

        let mut out = Vec::new();
        let write = cli(&["ghtree", "write", "b.txt", "--content", "bee", "-m", "add b"]);
        execute(write.command, &mut session, &mut out).await.unwrap();
        assert_eq!(forge.file_at("main", "b.txt"), Some(b"bee".to_vec()));

        let mut out = Vec::new();
        let read = cli(&["ghtree", "read", "b.txt"]);
        execute(read.command, &mut session, &mut out).await.unwrap();
        assert_eq!(out, b"bee");
    }
}
