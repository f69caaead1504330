//! cli::commands::refs
//!
//! `tip`, `branches` and `branch`.

use std::io::Write;

use anyhow::{Context as _, Result};

use super::Session;
use crate::core::types::{BranchName, RefName};

pub async fn tip(session: &Session, out: &mut dyn Write) -> Result<()> {
    let reference = session
        .repo
        .get_ref(&RefName::for_branch(&session.branch))
        .await
        .with_context(|| format!("failed to look up '{}'", session.branch))?;
    writeln!(out, "{}", reference.sha)?;
    Ok(())
}

/// One branch per line, `*` marking the session's branch.
pub async fn branches(session: &Session, out: &mut dyn Write) -> Result<()> {
    let refs = session
        .repo
        .list_branches()
        .await
        .context("failed to list branches")?;
    for reference in refs {
        let name = reference.branch().unwrap_or(&reference.name);
        let marker = if name == session.branch.as_str() { '*' } else { ' ' };
        writeln!(out, "{} {} {}", marker, name, reference.sha.short(7))?;
    }
    Ok(())
}

pub async fn branch(
    session: &Session,
    name: &str,
    from: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let new = BranchName::new(name).with_context(|| format!("invalid branch name '{}'", name))?;
    let from = match from {
        Some(f) => BranchName::new(f).with_context(|| format!("invalid branch name '{}'", f))?,
        None => session.branch.clone(),
    };
    let created = session
        .repo
        .branch(&from, &new)
        .await
        .with_context(|| format!("failed to create '{}' from '{}'", new, from))?;
    writeln!(out, "{} {}", new, created.sha)?;
    Ok(())
}
