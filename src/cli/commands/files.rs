//! cli::commands::files
//!
//! `read`, `write`, `rm` and `mv`.

use std::io::Write;

use anyhow::{bail, Context as _, Result};

use super::Session;
use crate::core::types::BlobContent;
use crate::repo::{CommitOptions, MutationOutcome};

/// Print the file at `path`. Binary content is written unchanged.
pub async fn read(session: &Session, path: &str, out: &mut dyn Write) -> Result<()> {
    let file = session
        .repo
        .read(&session.branch, path)
        .await
        .with_context(|| format!("failed to read '{}' on '{}'", path, session.branch))?;
    let Some(file) = file else {
        bail!("'{}' does not exist on '{}'", path, session.branch);
    };
    out.write_all(file.content.as_bytes())?;
    Ok(())
}

pub async fn write(
    session: &mut Session,
    path: &str,
    bytes: Vec<u8>,
    message: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let branch = session.branch.clone();
    let outcome = session
        .repo
        .write(
            &branch,
            path,
            BlobContent::from_bytes(bytes),
            CommitOptions::message(message),
        )
        .await
        .with_context(|| format!("failed to write '{}' on '{}'", path, branch))?;
    report(out, &branch.to_string(), &outcome)
}

pub async fn rm(
    session: &mut Session,
    path: &str,
    message: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let branch = session.branch.clone();
    let result = match message {
        Some(message) => {
            session
                .repo
                .remove_with(&branch, path, CommitOptions::message(message))
                .await
        }
        None => session.repo.remove(&branch, path).await,
    };
    let outcome = result.with_context(|| format!("failed to remove '{}' on '{}'", path, branch))?;
    report(out, &branch.to_string(), &outcome)
}

pub async fn mv(
    session: &mut Session,
    from: &str,
    to: &str,
    message: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let branch = session.branch.clone();
    let result = match message {
        Some(message) => {
            session
                .repo
                .move_with(&branch, from, to, CommitOptions::message(message))
                .await
        }
        None => session.repo.move_path(&branch, from, to).await,
    };
    let outcome = result
        .with_context(|| format!("failed to move '{}' to '{}' on '{}'", from, to, branch))?;
    report(out, &branch.to_string(), &outcome)
}

fn report(out: &mut dyn Write, branch: &str, outcome: &MutationOutcome) -> Result<()> {
    writeln!(
        out,
        "{} {} -> {}",
        branch,
        outcome.parent.short(7),
        outcome.commit
    )?;
    Ok(())
}
