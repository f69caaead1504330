//! repo::resolver
//!
//! Branch tip cache and the refs endpoints.
//!
//! The cache holds one `(branch, sha)` slot. A lookup for the cached branch
//! is answered locally; any other branch replaces the slot.

use serde::Deserialize;

use super::{escape_path, Repository};
use crate::core::types::{BranchName, Oid, RefName};
use crate::forge::{ApiRequest, ForgeError};

/// Single-slot cache of the most recently used branch's tip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchTip {
    branch: Option<BranchName>,
    sha: Option<Oid>,
}

impl BranchTip {
    /// Cached tip of `branch`, if the slot belongs to it.
    pub fn get(&self, branch: &BranchName) -> Option<&Oid> {
        match &self.branch {
            Some(cached) if cached == branch => self.sha.as_ref(),
            _ => None,
        }
    }

    pub fn branch(&self) -> Option<&BranchName> {
        self.branch.as_ref()
    }

    pub fn sha(&self) -> Option<&Oid> {
        self.sha.as_ref()
    }

    pub(crate) fn set(&mut self, branch: &BranchName, sha: Oid) {
        self.branch = Some(branch.clone());
        self.sha = Some(sha);
    }

    pub(crate) fn clear(&mut self) {
        self.branch = None;
        self.sha = None;
    }
}

/// A ref and the object it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Full name, e.g. `refs/heads/main`.
    pub name: String,
    pub sha: Oid,
}

impl Reference {
    /// Branch name, for refs under `refs/heads/`.
    pub fn branch(&self) -> Option<&str> {
        self.name.strip_prefix("refs/heads/")
    }
}

#[derive(Deserialize)]
pub(super) struct RefResponse {
    #[serde(rename = "ref")]
    name: String,
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: Oid,
}

impl From<RefResponse> for Reference {
    fn from(wire: RefResponse) -> Self {
        Reference {
            name: wire.name,
            sha: wire.object.sha,
        }
    }
}

impl Repository {
    /// Current commit of `branch`, from the cache when it holds that branch.
    ///
    /// A fetched tip replaces the cache slot.
    pub async fn resolve_tip(&mut self, branch: &BranchName) -> Result<Oid, ForgeError> {
        if let Some(sha) = self.tip.get(branch) {
            tracing::debug!(branch = %branch, sha = %sha.short(7), "tip from cache");
            return Ok(sha.clone());
        }

        let reference = self.get_ref(&RefName::for_branch(branch)).await?;
        tracing::debug!(branch = %branch, sha = %reference.sha.short(7), "tip resolved");
        self.tip.set(branch, reference.sha.clone());
        Ok(reference.sha)
    }

    /// Forget the cached tip.
    pub fn invalidate(&mut self) {
        self.tip.clear();
    }

    /// Look a ref up on the remote. Never cached.
    pub async fn get_ref(&self, name: &RefName) -> Result<Reference, ForgeError> {
        let wire: RefResponse = self
            .get_json(self.path(&format!("git/refs/{}", escape_path(name.as_str()))))
            .await?;
        Ok(wire.into())
    }

    /// Create `name` pointing at `sha`.
    pub async fn create_ref(&self, name: &RefName, sha: &Oid) -> Result<Reference, ForgeError> {
        let path = self.path("git/refs");
        let body = serde_json::json!({ "ref": name.full(), "sha": sha });
        let response = self
            .transport
            .send(ApiRequest::post(path.clone()).json(body))
            .await?;
        let wire: RefResponse = response.json(&path)?;
        tracing::info!(reference = %name, sha = %sha.short(7), "ref created");
        Ok(wire.into())
    }

    /// Delete `name`.
    pub async fn delete_ref(&self, name: &RefName) -> Result<(), ForgeError> {
        let path = self.path(&format!("git/refs/{}", escape_path(name.as_str())));
        self.transport.send(ApiRequest::delete(path)).await?;
        tracing::info!(reference = %name, "ref deleted");
        Ok(())
    }
}
