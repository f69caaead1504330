//! repo
//!
//! File-level mutations against a remote repository's object graph.
//!
//! # Architecture
//!
//! A [`Repository`] handle owns a [`Transport`], the `owner/name` it
//! addresses, and the single-slot [`BranchTip`] cache. Every mutation runs
//! the same sequential pipeline:
//!
//! 1. **ResolveTip** - current commit of the branch (cached or fetched)
//! 2. **BuildTree** - new root tree containing the edit
//! 3. **Commit** - one-parent commit over the new tree
//! 4. **UpdateRef** - advance the branch to the new commit
//!
//! The first failing stage ends the call and its error is returned as-is.
//! Objects created by earlier stages are left on the remote, unreferenced.
//!
//! # Submodules
//!
//! - `resolver` - branch tip cache and ref endpoints
//! - `builder` - flat tree edits, blob and tree creation
//! - `writer` - commit creation and ref advancement
//!
//! # Concurrency
//!
//! Mutations borrow the handle mutably, so one handle never interleaves two
//! pipelines. Separate handles writing the same branch can still race; the
//! remote arbitrates, or [`RefUpdatePolicy::CompareAndSwap`] turns the race
//! into [`ForgeError::Conflict`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ghtree::core::types::BranchName;
//! use ghtree::forge::mock::MockForge;
//! use ghtree::repo::{CommitOptions, Repository};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new("octocat", "hello");
//! forge.seed_commit("main", &[("README.md", b"hi".as_slice())], "init");
//!
//! let mut repo = Repository::new(Arc::new(forge), "octocat", "hello");
//! let main = BranchName::new("main").unwrap();
//! repo.write(&main, "notes.txt", "hello", CommitOptions::message("add notes"))
//!     .await
//!     .unwrap();
//!
//! let file = repo.read(&main, "notes.txt").await.unwrap().unwrap();
//! assert_eq!(file.content.as_bytes(), b"hello");
//! # });
//! ```

mod builder;
mod resolver;
mod writer;

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;

use crate::core::types::{
    Author, BlobContent, BranchName, Oid, RefName, RefUpdatePolicy, TreeEntry,
};
use crate::forge::{request_all_pages, ApiRequest, ForgeError, Transport};

pub use builder::{apply_edit, locate_entry, TreeEdit};
pub use resolver::{BranchTip, Reference};

/// Per-handle settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySettings {
    /// Identity used when a call does not name one.
    pub author: Option<Author>,
    pub ref_update: RefUpdatePolicy,
}

/// Per-call commit options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    pub message: String,
    /// Overrides [`RepositorySettings::author`] for this commit.
    pub author: Option<Author>,
}

impl CommitOptions {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author: None,
        }
    }

    pub fn with_author(mut self, author: Author) -> Self {
        self.author = Some(author);
        self
    }
}

/// Objects produced by one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Tip the commit was built on.
    pub parent: Oid,
    pub tree: Oid,
    pub commit: Oid,
}

/// A file read back from a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContents {
    pub sha: Oid,
    pub content: BlobContent,
}

/// A tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tree {
    pub sha: Oid,
    pub tree: Vec<TreeEntry>,
    /// The remote cut a recursive listing short.
    #[serde(default)]
    pub truncated: bool,
}

/// A commit object from the git data API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: Oid,
    pub message: String,
    pub tree: Oid,
    pub parents: Vec<Oid>,
}

/// One row of the commit history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: Oid,
    pub message: String,
    pub author: Option<Author>,
    pub parents: Vec<Oid>,
}

/// Filters for [`Repository::get_commits`].
///
/// `since` and `until` are ISO 8601 timestamps, passed through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitQuery {
    /// Branch or commit to start the walk from.
    pub sha: Option<String>,
    /// Only commits touching this path.
    pub path: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

impl CommitQuery {
    /// Query string (without the leading `?`), values percent-encoded.
    pub fn to_query_string(&self) -> String {
        let params = [
            ("sha", &self.sha),
            ("path", &self.path),
            ("since", &self.since),
            ("until", &self.until),
        ];
        params
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|v| format!("{}={}", key, utf8_percent_encode(v, NON_ALPHANUMERIC)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: Oid,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: Oid,
    message: String,
    tree: ShaOnly,
    #[serde(default)]
    parents: Vec<ShaOnly>,
}

#[derive(Deserialize)]
struct CommitListItem {
    sha: Oid,
    commit: CommitListDetail,
    #[serde(default)]
    parents: Vec<ShaOnly>,
}

#[derive(Deserialize)]
struct CommitListDetail {
    message: String,
    #[serde(default)]
    author: Option<Author>,
}

/// Handle on one remote repository.
pub struct Repository {
    transport: Arc<dyn Transport>,
    owner: String,
    name: String,
    settings: RepositorySettings,
    tip: BranchTip,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("transport", &self.transport.name())
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("tip", &self.tip)
            .finish()
    }
}

impl Repository {
    pub fn new(
        transport: Arc<dyn Transport>,
        owner: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            owner: owner.into(),
            name: name.into(),
            settings: RepositorySettings::default(),
            tip: BranchTip::default(),
        }
    }

    pub fn with_settings(mut self, settings: RepositorySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    /// The cached branch tip.
    pub fn tip(&self) -> &BranchTip {
        &self.tip
    }

    /// API path for `suffix` under this repository.
    fn path(&self, suffix: &str) -> String {
        format!("/repos/{}/{}/{}", self.owner, self.name, suffix)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: String) -> Result<T, ForgeError> {
        let response = self.transport.send(ApiRequest::get(path.clone())).await?;
        response.json(&path)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create or replace the file at `path` with `content`.
    ///
    /// BuildTree creates the blob, then a tree over the tip's root tree
    /// carrying only the changed entry.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `path` is empty
    /// - the first failing stage's error otherwise
    pub async fn write(
        &mut self,
        branch: &BranchName,
        path: &str,
        content: impl Into<BlobContent>,
        options: CommitOptions,
    ) -> Result<MutationOutcome, ForgeError> {
        let path = normalize_path(path)?;
        let content = content.into();

        let parent = self.resolve_tip(branch).await?;
        let blob = self.create_blob(&content).await?;
        let edit = TreeEdit::Upsert { path, blob };
        self.finish(branch, parent, &edit, &options).await
    }

    /// Delete the file or directory at `path`, with a default message.
    pub async fn remove(
        &mut self,
        branch: &BranchName,
        path: &str,
    ) -> Result<MutationOutcome, ForgeError> {
        let path = normalize_path(path)?;
        let options = CommitOptions::message(format!("Deleted {}", path));
        self.remove_with(branch, &path, options).await
    }

    /// Delete the file or directory at `path`.
    ///
    /// Removing a path that is not in the tree still creates a commit.
    pub async fn remove_with(
        &mut self,
        branch: &BranchName,
        path: &str,
        options: CommitOptions,
    ) -> Result<MutationOutcome, ForgeError> {
        let path = normalize_path(path)?;
        let parent = self.resolve_tip(branch).await?;
        self.finish(branch, parent, &TreeEdit::Remove { path }, &options)
            .await
    }

    /// Move `from` to `to`, with a default message.
    pub async fn move_path(
        &mut self,
        branch: &BranchName,
        from: &str,
        to: &str,
    ) -> Result<MutationOutcome, ForgeError> {
        let from = normalize_path(from)?;
        let to = normalize_path(to)?;
        let options = CommitOptions::message(format!("Moved {} to {}", from, to));
        self.move_with(branch, &from, &to, options).await
    }

    /// Move the file or directory at `from` to `to`, replacing whatever was
    /// at `to`.
    pub async fn move_with(
        &mut self,
        branch: &BranchName,
        from: &str,
        to: &str,
        options: CommitOptions,
    ) -> Result<MutationOutcome, ForgeError> {
        let from = normalize_path(from)?;
        let to = normalize_path(to)?;
        let parent = self.resolve_tip(branch).await?;
        self.finish(branch, parent, &TreeEdit::Rename { from, to }, &options)
            .await
    }

    /// Stages 2 to 4, shared by every mutation.
    async fn finish(
        &mut self,
        branch: &BranchName,
        parent: Oid,
        edit: &TreeEdit,
        options: &CommitOptions,
    ) -> Result<MutationOutcome, ForgeError> {
        let tree = self.build_tree(&parent, edit).await?;
        let commit = self.commit(branch, &parent, &tree, options).await?;
        self.update_head(branch, &commit, &parent).await?;
        Ok(MutationOutcome {
            parent,
            tree,
            commit,
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read the file at `path` on `branch`.
    ///
    /// Always asks the remote; the tip cache is neither consulted nor
    /// updated. Returns `None` when `path` is not in the tree.
    pub async fn read(
        &self,
        branch: &BranchName,
        path: &str,
    ) -> Result<Option<FileContents>, ForgeError> {
        let Some(sha) = self.get_sha(branch, path).await? else {
            return Ok(None);
        };
        let content = self.get_blob(&sha).await?;
        Ok(Some(FileContents { sha, content }))
    }

    /// Object id at `path` on `branch`.
    ///
    /// An empty path yields the branch tip itself.
    pub async fn get_sha(
        &self,
        branch: &BranchName,
        path: &str,
    ) -> Result<Option<Oid>, ForgeError> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            let reference = self.get_ref(&RefName::for_branch(branch)).await?;
            return Ok(Some(reference.sha));
        }
        let tree = self.fetch_flat_tree(branch.as_str()).await?;
        Ok(locate_entry(&tree, path).and_then(|entry| entry.sha.clone()))
    }

    /// Raw content of a blob.
    pub async fn get_blob(&self, sha: &Oid) -> Result<BlobContent, ForgeError> {
        let path = self.path(&format!("git/blobs/{}", sha));
        let response = self.transport.send(ApiRequest::get(path).raw()).await?;
        Ok(BlobContent::from_bytes(response.body))
    }

    /// One level of a tree (tree id, commit id or branch name).
    pub async fn get_tree(&self, tree_ish: &str) -> Result<Tree, ForgeError> {
        self.get_json(self.path(&format!("git/trees/{}", escape_path(tree_ish))))
            .await
    }

    pub async fn get_commit(&self, sha: &Oid) -> Result<Commit, ForgeError> {
        let wire: CommitResponse = self
            .get_json(self.path(&format!("git/commits/{}", sha)))
            .await?;
        Ok(Commit {
            sha: wire.sha,
            message: wire.message,
            tree: wire.tree.sha,
            parents: wire.parents.into_iter().map(|p| p.sha).collect(),
        })
    }

    /// Commit history, newest first, across every page.
    pub async fn get_commits(&self, query: &CommitQuery) -> Result<Vec<CommitSummary>, ForgeError> {
        let qs = query.to_query_string();
        let path = if qs.is_empty() {
            self.path("commits")
        } else {
            format!("{}?{}", self.path("commits"), qs)
        };
        let items: Vec<CommitListItem> = request_all_pages(self.transport.as_ref(), &path).await?;
        Ok(items
            .into_iter()
            .map(|item| CommitSummary {
                sha: item.sha,
                message: item.commit.message,
                author: item.commit.author,
                parents: item.parents.into_iter().map(|p| p.sha).collect(),
            })
            .collect())
    }

    /// Every branch, across every page.
    pub async fn list_branches(&self) -> Result<Vec<Reference>, ForgeError> {
        let path = self.path("git/refs/heads");
        let refs: Vec<resolver::RefResponse> =
            request_all_pages(self.transport.as_ref(), &path).await?;
        Ok(refs.into_iter().map(Reference::from).collect())
    }

    /// Create branch `new` at the current tip of `from`.
    ///
    /// The tip cache is left alone.
    pub async fn branch(
        &self,
        from: &BranchName,
        new: &BranchName,
    ) -> Result<Reference, ForgeError> {
        let source = self.get_ref(&RefName::for_branch(from)).await?;
        self.create_ref(&RefName::for_branch(new), &source.sha).await
    }
}

/// Bytes escaped within one URL path segment: everything but RFC 3986
/// unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode each `/`-separated segment of a ref name or tree-ish.
///
/// ```text
/// heads/fix#1      -> heads/fix%231
/// heads/feature/x  -> heads/feature/x
/// ```
pub(crate) fn escape_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Strip surrounding slashes; reject paths that name nothing.
fn normalize_path(path: &str) -> Result<String, ForgeError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(ForgeError::InvalidRequest("path cannot be empty".into()));
    }
    Ok(trimmed.to_string())
}
