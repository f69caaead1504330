//! repo::writer
//!
//! Commit creation and branch advancement.
//!
//! `commit` moves the cached tip to the new commit before the ref is
//! updated. If `update_head` then fails the cache is ahead of the remote
//! and stays that way, except on a compare-and-swap conflict, which clears
//! it.

use serde::Deserialize;
use serde_json::json;

use super::{escape_path, CommitOptions, Repository};
use crate::core::types::{BranchName, Oid, RefName, RefUpdatePolicy};
use crate::forge::{ApiRequest, ForgeError};

#[derive(Deserialize)]
struct Created {
    sha: Oid,
}

impl Repository {
    /// Create a one-parent commit of `tree` and cache it as `branch`'s tip.
    ///
    /// The author is taken from `options`, then from the handle's settings.
    /// With neither, the field is left out and the remote uses the
    /// authenticated user.
    pub async fn commit(
        &mut self,
        branch: &BranchName,
        parent: &Oid,
        tree: &Oid,
        options: &CommitOptions,
    ) -> Result<Oid, ForgeError> {
        let path = self.path("git/commits");
        let mut body = json!({
            "message": options.message,
            "parents": [parent],
            "tree": tree,
        });
        if let Some(author) = options.author.as_ref().or(self.settings.author.as_ref()) {
            body["author"] = json!({ "name": author.name, "email": author.email });
        }

        let response = self
            .transport
            .send(ApiRequest::post(path.clone()).json(body))
            .await?;
        let created: Created = response.json(&path)?;
        tracing::debug!(
            sha = %created.sha.short(7),
            parent = %parent.short(7),
            tree = %tree.short(7),
            "commit created"
        );

        self.tip.set(branch, created.sha.clone());
        Ok(created.sha)
    }

    /// Point `branch` at `commit`.
    ///
    /// `expected` is the tip the commit was built on. Under
    /// [`RefUpdatePolicy::CompareAndSwap`] the live ref is read first and
    /// the update is refused with `ForgeError::Conflict` if it moved.
    pub async fn update_head(
        &mut self,
        branch: &BranchName,
        commit: &Oid,
        expected: &Oid,
    ) -> Result<(), ForgeError> {
        let refname = RefName::for_branch(branch);

        if self.settings.ref_update == RefUpdatePolicy::CompareAndSwap {
            let live = self.get_ref(&refname).await?;
            if &live.sha != expected {
                tracing::warn!(
                    branch = %branch,
                    expected = %expected.short(7),
                    actual = %live.sha.short(7),
                    "branch moved since tip was resolved"
                );
                self.invalidate();
                return Err(ForgeError::Conflict {
                    branch: branch.clone(),
                    expected: expected.clone(),
                    actual: live.sha,
                });
            }
        }

        let path = self.path(&format!("git/refs/{}", escape_path(refname.as_str())));
        self.transport
            .send(ApiRequest::patch(path).json(json!({ "sha": commit })))
            .await?;
        tracing::info!(branch = %branch, sha = %commit.short(7), "branch advanced");
        Ok(())
    }
}
