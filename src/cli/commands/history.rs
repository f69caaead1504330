//! cli::commands::history
//!
//! `log`: commit history of the session branch.

use std::io::Write;

use anyhow::{Context as _, Result};

use super::Session;
use crate::repo::CommitQuery;

pub async fn log(
    session: &Session,
    path: Option<String>,
    since: Option<String>,
    until: Option<String>,
    limit: Option<usize>,
    out: &mut dyn Write,
) -> Result<()> {
    let query = CommitQuery {
        sha: Some(session.branch.to_string()),
        path,
        since,
        until,
    };
    let commits = session
        .repo
        .get_commits(&query)
        .await
        .with_context(|| format!("failed to list commits on '{}'", session.branch))?;

    for commit in commits.iter().take(limit.unwrap_or(usize::MAX)) {
        let subject = commit.message.lines().next().unwrap_or_default();
        match &commit.author {
            Some(author) => writeln!(out, "{} {} ({})", commit.sha.short(7), subject, author.name)?,
            None => writeln!(out, "{} {}", commit.sha.short(7), subject)?,
        }
    }
    Ok(())
}
