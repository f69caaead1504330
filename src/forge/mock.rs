//! forge::mock
//!
//! In-memory hosting API for deterministic testing.
//!
//! # Design
//!
//! [`MockForge`] implements [`Transport`] by interpreting the git data
//! endpoints (refs, trees, blobs, commits) against a content-addressed
//! object store held in memory. Object ids are the first 40 hex digits of
//! a SHA-256 over the object's canonical form, so identical content always
//! yields the identical id.
//!
//! Every request is recorded as a [`MockOperation`] and failures can be
//! injected per operation kind with [`FailOn`].
//!
//! Ref updates follow the remote's default policy: a `PATCH` that is not a
//! fast-forward is rejected with 422 unless `force` is set.
//!
//! # Example
//!
//! ```
//! use ghtree::forge::mock::MockForge;
//!
//! let forge = MockForge::new("octocat", "hello");
//! let tip = forge.seed_commit("main", &[("README.md", b"hi".as_slice())], "init");
//! assert_eq!(forge.ref_sha("main"), Some(tip));
//! assert_eq!(forge.file_at("main", "README.md"), Some(b"hi".to_vec()));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::traits::{ApiRequest, ApiResponse, ForgeError, Method, Transport};
use crate::core::types::{EncodedBlob, EntryMode, EntryType, Oid, TreeEntry};

/// Origin used for absolute pagination links.
pub const MOCK_ORIGIN: &str = "https://mock.invalid";

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

#[derive(Debug)]
struct MockForgeInner {
    /// `/repos/{owner}/{repo}/`
    repo_prefix: String,
    blobs: HashMap<Oid, Vec<u8>>,
    trees: HashMap<Oid, Vec<StoredEntry>>,
    commits: HashMap<Oid, StoredCommit>,
    /// Keyed by name relative to `refs/` (e.g. `heads/main`).
    refs: BTreeMap<String, Oid>,
    fail_on: Vec<FailOn>,
    operations: Vec<MockOperation>,
    /// Page size for list endpoints; `None` returns everything at once.
    page_size: Option<usize>,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    name: String,
    mode: EntryMode,
    kind: EntryType,
    sha: Oid,
}

#[derive(Debug, Clone)]
struct StoredCommit {
    tree: Oid,
    parents: Vec<Oid>,
    message: String,
    author: Option<Value>,
}

/// A non-tree leaf of a flattened tree.
#[derive(Debug, Clone)]
struct Leaf {
    mode: EntryMode,
    kind: EntryType,
    sha: Oid,
}

/// Kinds of remote operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    GetRef,
    ListRefs,
    CreateRef,
    DeleteRef,
    UpdateRef,
    GetTree,
    CreateTree,
    CreateBlob,
    GetBlob,
    GetCommit,
    CreateCommit,
    ListCommits,
    Other,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub struct FailOn {
    pub operation: OperationKind,
    pub error: ForgeError,
}

impl FailOn {
    pub fn new(operation: OperationKind, error: ForgeError) -> Self {
        Self { operation, error }
    }

    /// Fail `operation` with a status error for its own path.
    pub fn status(operation: OperationKind, status: u16) -> Self {
        Self::new(
            operation,
            ForgeError::Status {
                status,
                path: String::new(),
                message: "injected failure".into(),
            },
        )
    }
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOperation {
    GetRef {
        name: String,
    },
    ListRefs {
        namespace: String,
    },
    CreateRef {
        name: String,
        sha: String,
    },
    DeleteRef {
        name: String,
    },
    UpdateRef {
        name: String,
        sha: String,
    },
    GetTree {
        tree_ish: String,
        recursive: bool,
    },
    CreateTree {
        base_tree: Option<String>,
        entries: Vec<TreeEntry>,
    },
    CreateBlob {
        encoding: String,
    },
    GetBlob {
        sha: String,
        raw: bool,
    },
    GetCommit {
        sha: String,
    },
    CreateCommit {
        parents: Vec<String>,
        tree: String,
        message: String,
    },
    ListCommits {
        query: String,
    },
    Other {
        method: Method,
        path: String,
    },
}

impl MockOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            MockOperation::GetRef { .. } => OperationKind::GetRef,
            MockOperation::ListRefs { .. } => OperationKind::ListRefs,
            MockOperation::CreateRef { .. } => OperationKind::CreateRef,
            MockOperation::DeleteRef { .. } => OperationKind::DeleteRef,
            MockOperation::UpdateRef { .. } => OperationKind::UpdateRef,
            MockOperation::GetTree { .. } => OperationKind::GetTree,
            MockOperation::CreateTree { .. } => OperationKind::CreateTree,
            MockOperation::CreateBlob { .. } => OperationKind::CreateBlob,
            MockOperation::GetBlob { .. } => OperationKind::GetBlob,
            MockOperation::GetCommit { .. } => OperationKind::GetCommit,
            MockOperation::CreateCommit { .. } => OperationKind::CreateCommit,
            MockOperation::ListCommits { .. } => OperationKind::ListCommits,
            MockOperation::Other { .. } => OperationKind::Other,
        }
    }
}

// --------------------------------------------------------------------------
// Request bodies
// --------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateRefBody {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: Oid,
}

#[derive(Deserialize)]
struct UpdateRefBody {
    sha: Oid,
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct CreateTreeBody {
    #[serde(default)]
    base_tree: Option<Oid>,
    tree: Vec<TreeEntry>,
}

#[derive(Deserialize)]
struct CreateCommitBody {
    message: String,
    #[serde(default)]
    author: Option<Value>,
    parents: Vec<Oid>,
    tree: Oid,
}

impl MockForge {
    /// Create an empty mock repository `owner/repo`.
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                repo_prefix: format!("/repos/{}/{}/", owner, repo),
                blobs: HashMap::new(),
                trees: HashMap::new(),
                commits: HashMap::new(),
                refs: BTreeMap::new(),
                fail_on: Vec::new(),
                operations: Vec::new(),
                page_size: None,
            })),
        }
    }

    /// Split list responses into pages of `size`, linked with `Link` headers.
    pub fn with_page_size(self, size: usize) -> Self {
        self.inner.lock().unwrap().page_size = Some(size.max(1));
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// ```
    /// use ghtree::forge::mock::{FailOn, MockForge, OperationKind};
    ///
    /// let forge = MockForge::new("o", "r")
    ///     .fail_on(FailOn::status(OperationKind::UpdateRef, 422));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.inner.lock().unwrap().fail_on.push(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.inner.lock().unwrap().fail_on.clear();
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Recorded operation kinds, in order.
    pub fn operation_kinds(&self) -> Vec<OperationKind> {
        self.operations().iter().map(MockOperation::kind).collect()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.inner.lock().unwrap().operations.clear();
    }

    /// Commit `files` on top of `branch` (or as a root commit) and move the
    /// branch to it, without recording operations.
    ///
    /// Files are merged over the current tip's tree.
    pub fn seed_commit<B: AsRef<[u8]>>(
        &self,
        branch: &str,
        files: &[(&str, B)],
        message: &str,
    ) -> Oid {
        let mut inner = self.inner.lock().unwrap();
        let ref_name = format!("heads/{}", branch);
        let parent = inner.refs.get(&ref_name).cloned();

        let mut leaves = BTreeMap::new();
        if let Some(parent) = &parent {
            let tree = inner.commits[parent].tree.clone();
            inner.collect_leaves(&tree, "", &mut leaves);
        }
        for (path, bytes) in files {
            let sha = inner.put_blob(bytes.as_ref().to_vec());
            leaves.insert(
                path.to_string(),
                Leaf {
                    mode: EntryMode::File,
                    kind: EntryType::Blob,
                    sha,
                },
            );
        }
        let tree = inner.write_tree(&leaves);
        let commit = inner.put_commit(StoredCommit {
            tree,
            parents: parent.into_iter().collect(),
            message: message.to_string(),
            author: None,
        });
        inner.refs.insert(ref_name, commit.clone());
        commit
    }

    /// Move a branch directly, as another client pushing would.
    pub fn force_ref(&self, branch: &str, sha: &Oid) {
        self.inner
            .lock()
            .unwrap()
            .refs
            .insert(format!("heads/{}", branch), sha.clone());
    }

    /// Current SHA of a branch.
    pub fn ref_sha(&self, branch: &str) -> Option<Oid> {
        self.inner
            .lock()
            .unwrap()
            .refs
            .get(&format!("heads/{}", branch))
            .cloned()
    }

    /// Parents of a stored commit.
    pub fn commit_parents(&self, sha: &Oid) -> Option<Vec<Oid>> {
        let inner = self.inner.lock().unwrap();
        inner.commits.get(sha).map(|c| c.parents.clone())
    }

    /// Message of a stored commit.
    pub fn commit_message(&self, sha: &Oid) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.commits.get(sha).map(|c| c.message.clone())
    }

    /// Author object submitted with a stored commit.
    pub fn commit_author(&self, sha: &Oid) -> Option<Value> {
        let inner = self.inner.lock().unwrap();
        inner.commits.get(sha).and_then(|c| c.author.clone())
    }

    /// Root tree of a stored commit.
    pub fn commit_tree(&self, sha: &Oid) -> Option<Oid> {
        let inner = self.inner.lock().unwrap();
        inner.commits.get(sha).map(|c| c.tree.clone())
    }

    /// Recursive listing of a branch's tree.
    pub fn flat_tree(&self, branch: &str) -> Vec<TreeEntry> {
        let inner = self.inner.lock().unwrap();
        match inner.resolve_tree_ish(branch) {
            Some(tree) => inner.list_tree(&tree, "", true),
            None => Vec::new(),
        }
    }

    /// Bytes of the file at `path` on `branch`.
    pub fn file_at(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        let tree = inner.resolve_tree_ish(branch)?;
        let entry = inner
            .list_tree(&tree, "", true)
            .into_iter()
            .find(|e| e.path == path && e.kind == EntryType::Blob)?;
        inner.blobs.get(entry.sha.as_ref()?).cloned()
    }

    /// Number of stored blobs (including unreachable ones).
    pub fn blob_count(&self) -> usize {
        self.inner.lock().unwrap().blobs.len()
    }
}

impl MockForgeInner {
    fn hash(kind: &str, data: &[u8]) -> Oid {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(data);
        let digest = hex::encode(hasher.finalize());
        Oid::new(&digest[..40]).expect("sha256 hex digest is a valid oid")
    }

    fn put_blob(&mut self, bytes: Vec<u8>) -> Oid {
        let sha = Self::hash("blob", &bytes);
        self.blobs.insert(sha.clone(), bytes);
        sha
    }

    fn put_tree(&mut self, mut entries: Vec<StoredEntry>) -> Oid {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let mut canonical = String::new();
        for e in &entries {
            let mode = serde_json::to_string(&e.mode).unwrap_or_default();
            canonical.push_str(&format!("{} {:?} {} {}\n", mode, e.kind, e.sha, e.name));
        }
        let sha = Self::hash("tree", canonical.as_bytes());
        self.trees.insert(sha.clone(), entries);
        sha
    }

    fn put_commit(&mut self, commit: StoredCommit) -> Oid {
        let parents: Vec<&str> = commit.parents.iter().map(Oid::as_str).collect();
        let canonical = format!(
            "tree {}\nparents {}\nauthor {}\n\n{}",
            commit.tree,
            parents.join(" "),
            commit.author.as_ref().map(Value::to_string).unwrap_or_default(),
            commit.message
        );
        let sha = Self::hash("commit", canonical.as_bytes());
        self.commits.insert(sha.clone(), commit);
        sha
    }

    /// Build nested trees from a flat path → leaf map.
    fn write_tree(&mut self, leaves: &BTreeMap<String, Leaf>) -> Oid {
        let mut entries = Vec::new();
        let mut dirs: BTreeMap<String, BTreeMap<String, Leaf>> = BTreeMap::new();
        for (path, leaf) in leaves {
            match path.split_once('/') {
                Some((dir, rest)) => {
                    dirs.entry(dir.to_string())
                        .or_default()
                        .insert(rest.to_string(), leaf.clone());
                }
                None => entries.push(StoredEntry {
                    name: path.clone(),
                    mode: leaf.mode,
                    kind: leaf.kind,
                    sha: leaf.sha.clone(),
                }),
            }
        }
        for (name, children) in dirs {
            let sha = self.write_tree(&children);
            entries.push(StoredEntry {
                name,
                mode: EntryMode::Directory,
                kind: EntryType::Tree,
                sha,
            });
        }
        self.put_tree(entries)
    }

    fn collect_leaves(&self, tree: &Oid, prefix: &str, out: &mut BTreeMap<String, Leaf>) {
        let Some(entries) = self.trees.get(tree) else {
            return;
        };
        for e in entries {
            let path = join_path(prefix, &e.name);
            if e.kind == EntryType::Tree {
                self.collect_leaves(&e.sha, &path, out);
            } else {
                out.insert(
                    path,
                    Leaf {
                        mode: e.mode,
                        kind: e.kind,
                        sha: e.sha.clone(),
                    },
                );
            }
        }
    }

    /// Listing in the remote's shape: each directory precedes its children.
    fn list_tree(&self, tree: &Oid, prefix: &str, recursive: bool) -> Vec<TreeEntry> {
        let mut out = Vec::new();
        let Some(entries) = self.trees.get(tree) else {
            return out;
        };
        for e in entries {
            let path = join_path(prefix, &e.name);
            out.push(TreeEntry {
                path: path.clone(),
                mode: e.mode,
                kind: e.kind,
                sha: Some(e.sha.clone()),
            });
            if recursive && e.kind == EntryType::Tree {
                out.extend(self.list_tree(&e.sha, &path, true));
            }
        }
        out
    }

    /// Tree SHA for a tree id, commit id or branch name.
    fn resolve_tree_ish(&self, tree_ish: &str) -> Option<Oid> {
        if let Ok(oid) = Oid::new(tree_ish) {
            if self.trees.contains_key(&oid) {
                return Some(oid);
            }
            if let Some(commit) = self.commits.get(&oid) {
                return Some(commit.tree.clone());
            }
        }
        let commit = self.resolve_commit_ish(tree_ish)?;
        self.commits.get(&commit).map(|c| c.tree.clone())
    }

    fn resolve_commit_ish(&self, commit_ish: &str) -> Option<Oid> {
        if let Ok(oid) = Oid::new(commit_ish) {
            if self.commits.contains_key(&oid) {
                return Some(oid);
            }
        }
        self.refs.get(&format!("heads/{}", commit_ish)).cloned()
    }

    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> bool {
        let mut stack = vec![descendant.clone()];
        while let Some(sha) = stack.pop() {
            if &sha == ancestor {
                return true;
            }
            if let Some(commit) = self.commits.get(&sha) {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    fn blob_at(&self, tree: &Oid, path: &str) -> Option<Oid> {
        self.list_tree(tree, "", true)
            .into_iter()
            .find(|e| e.path == path)
            .and_then(|e| e.sha)
    }

    /// Route a request, recording it first.
    fn handle(&mut self, request: &ApiRequest) -> Result<ApiResponse, ForgeError> {
        let full = request
            .path
            .strip_prefix(MOCK_ORIGIN)
            .unwrap_or(&request.path)
            .to_string();
        let (route, query) = match full.split_once('?') {
            Some((r, q)) => (r.to_string(), parse_query(q)),
            None => (full.clone(), HashMap::new()),
        };

        let Some(rest) = route.strip_prefix(&self.repo_prefix) else {
            self.operations.push(MockOperation::Other {
                method: request.method,
                path: request.path.clone(),
            });
            return Err(not_found(&request.path));
        };
        // Ref names and tree-ishes arrive percent-encoded per segment.
        let rest = percent_decode_str(rest).decode_utf8_lossy().into_owned();

        let op = classify(request, &rest, &query);
        self.operations.push(op.clone());

        if let Some(fail) = self.fail_on.iter().find(|f| f.operation == op.kind()) {
            return Err(match &fail.error {
                ForgeError::Status {
                    status, message, ..
                } => ForgeError::Status {
                    status: *status,
                    path: request.path.clone(),
                    message: message.clone(),
                },
                other => other.clone(),
            });
        }

        let path = request.path.as_str();
        match op {
            MockOperation::GetRef { name } => {
                let sha = self.refs.get(&name).ok_or_else(|| not_found(path))?;
                Ok(json_response(200, ref_json(&name, sha)))
            }
            MockOperation::ListRefs { namespace } => {
                let prefix = format!("{}/", namespace);
                let all: Vec<Value> = self
                    .refs
                    .iter()
                    .filter(|(name, _)| name.starts_with(&prefix))
                    .map(|(name, sha)| ref_json(name, sha))
                    .collect();
                Ok(self.paginate(&route, &query, all))
            }
            MockOperation::CreateRef { .. } => {
                let body: CreateRefBody = parse_body(request)?;
                let name = body
                    .ref_name
                    .strip_prefix("refs/")
                    .ok_or_else(|| unprocessable(path, "ref must start with 'refs/'"))?
                    .to_string();
                if self.refs.contains_key(&name) {
                    return Err(unprocessable(path, "Reference already exists"));
                }
                if !self.commits.contains_key(&body.sha) {
                    return Err(unprocessable(path, "Object does not exist"));
                }
                self.refs.insert(name.clone(), body.sha.clone());
                Ok(json_response(201, ref_json(&name, &body.sha)))
            }
            MockOperation::DeleteRef { name } => {
                if self.refs.remove(&name).is_none() {
                    return Err(unprocessable(path, "Reference does not exist"));
                }
                Ok(ApiResponse {
                    status: 204,
                    ..ApiResponse::default()
                })
            }
            MockOperation::UpdateRef { name, .. } => {
                let body: UpdateRefBody = parse_body(request)?;
                let current = self
                    .refs
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| unprocessable(path, "Reference does not exist"))?;
                if !self.commits.contains_key(&body.sha) {
                    return Err(unprocessable(path, "Object does not exist"));
                }
                if !body.force && !self.is_ancestor(&current, &body.sha) {
                    return Err(unprocessable(path, "Update is not a fast forward"));
                }
                self.refs.insert(name.clone(), body.sha.clone());
                Ok(json_response(200, ref_json(&name, &body.sha)))
            }
            MockOperation::GetTree {
                tree_ish,
                recursive,
            } => {
                let tree = self
                    .resolve_tree_ish(&tree_ish)
                    .ok_or_else(|| not_found(path))?;
                let entries = self.list_tree(&tree, "", recursive);
                Ok(json_response(
                    200,
                    json!({ "sha": tree, "tree": entries, "truncated": false }),
                ))
            }
            MockOperation::CreateTree { .. } => {
                let body: CreateTreeBody = parse_body(request)?;
                let sha = self.create_tree(body, path)?;
                Ok(json_response(201, json!({ "sha": sha })))
            }
            MockOperation::CreateBlob { .. } => {
                let body: EncodedBlob = parse_body(request)?;
                let content = body
                    .decode()
                    .map_err(|e| unprocessable(path, &e.to_string()))?;
                let sha = self.put_blob(content.as_bytes().to_vec());
                Ok(json_response(201, json!({ "sha": sha })))
            }
            MockOperation::GetBlob { sha, raw } => {
                let bytes = Oid::new(sha.as_str())
                    .ok()
                    .and_then(|oid| self.blobs.get(&oid))
                    .cloned()
                    .ok_or_else(|| not_found(path))?;
                if raw {
                    Ok(ApiResponse {
                        status: 200,
                        headers: HashMap::new(),
                        body: bytes,
                    })
                } else {
                    Ok(json_response(
                        200,
                        json!({
                            "sha": sha,
                            "size": bytes.len(),
                            "content": STANDARD.encode(&bytes),
                            "encoding": "base64",
                        }),
                    ))
                }
            }
            MockOperation::GetCommit { sha } => {
                let oid = Oid::new(sha.as_str()).map_err(|_| not_found(path))?;
                let commit = self.commits.get(&oid).ok_or_else(|| not_found(path))?;
                Ok(json_response(200, commit_json(&oid, commit)))
            }
            MockOperation::CreateCommit { .. } => {
                let body: CreateCommitBody = parse_body(request)?;
                if !self.trees.contains_key(&body.tree) {
                    return Err(unprocessable(path, "Tree SHA does not exist"));
                }
                if body.parents.iter().any(|p| !self.commits.contains_key(p)) {
                    return Err(unprocessable(path, "Parent SHA does not exist"));
                }
                let sha = self.put_commit(StoredCommit {
                    tree: body.tree,
                    parents: body.parents,
                    message: body.message,
                    author: body.author,
                });
                Ok(json_response(201, json!({ "sha": sha })))
            }
            MockOperation::ListCommits { .. } => {
                let start = query.get("sha").map(String::as_str).unwrap_or("main");
                let mut current = self.resolve_commit_ish(start);
                let mut all = Vec::new();
                while let Some(sha) = current {
                    let Some(commit) = self.commits.get(&sha) else {
                        break;
                    };
                    let touches = match query.get("path") {
                        None => true,
                        Some(p) => {
                            let mine = self.blob_at(&commit.tree, p);
                            let theirs = commit
                                .parents
                                .first()
                                .and_then(|parent| self.commits.get(parent))
                                .and_then(|parent| self.blob_at(&parent.tree, p));
                            mine != theirs
                        }
                    };
                    if touches {
                        all.push(json!({
                            "sha": sha,
                            "commit": { "message": commit.message, "tree": { "sha": commit.tree } },
                            "parents": commit.parents.iter().map(|p| json!({ "sha": p })).collect::<Vec<_>>(),
                        }));
                    }
                    current = commit.parents.first().cloned();
                }
                Ok(self.paginate(&route, &query, all))
            }
            MockOperation::Other { .. } => Err(not_found(path)),
        }
    }

    fn create_tree(&mut self, body: CreateTreeBody, path: &str) -> Result<Oid, ForgeError> {
        let mut leaves = BTreeMap::new();
        if let Some(base) = &body.base_tree {
            if !self.trees.contains_key(base) {
                return Err(unprocessable(path, "base_tree is not a valid tree"));
            }
            self.collect_leaves(base, "", &mut leaves);
        }

        for entry in body.tree {
            let under = format!("{}/", entry.path);
            match (entry.kind, entry.sha) {
                // Directories without a sha are implied by their children.
                (EntryType::Tree, None) => {}
                (EntryType::Tree, Some(sha)) => {
                    if !self.trees.contains_key(&sha) {
                        return Err(unprocessable(path, "tree sha does not exist"));
                    }
                    leaves.retain(|p, _| !p.starts_with(&under));
                    let mut sub = BTreeMap::new();
                    self.collect_leaves(&sha, &entry.path, &mut sub);
                    leaves.extend(sub);
                }
                // A null sha deletes the path.
                (_, None) => {
                    leaves.remove(&entry.path);
                    leaves.retain(|p, _| !p.starts_with(&under));
                }
                (kind, Some(sha)) => {
                    if kind == EntryType::Blob && !self.blobs.contains_key(&sha) {
                        return Err(unprocessable(path, "blob sha does not exist"));
                    }
                    leaves.retain(|p, _| !p.starts_with(&under));
                    leaves.insert(
                        entry.path,
                        Leaf {
                            mode: entry.mode,
                            kind,
                            sha,
                        },
                    );
                }
            }
        }

        Ok(self.write_tree(&leaves))
    }

    /// Slice `items` by `?page=` and attach a `Link` header when more remain.
    fn paginate(
        &self,
        route: &str,
        query: &HashMap<String, String>,
        items: Vec<Value>,
    ) -> ApiResponse {
        let Some(size) = self.page_size else {
            return json_response(200, Value::Array(items));
        };
        let page: usize = query
            .get("page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1)
            .max(1);
        let start = (page - 1) * size;
        let slice: Vec<Value> = items.iter().skip(start).take(size).cloned().collect();

        let mut response = json_response(200, Value::Array(slice));
        if start + size < items.len() {
            let mut params: Vec<String> = query
                .iter()
                .filter(|(k, _)| k.as_str() != "page")
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            params.sort();
            params.push(format!("page={}", page + 1));
            let next = format!("{}{}?{}", MOCK_ORIGIN, route, params.join("&"));
            response
                .headers
                .insert("link".to_string(), format!("<{}>; rel=\"next\"", next));
        }
        response
    }
}

/// Work out which operation a request performs from its method and path.
fn classify(request: &ApiRequest, rest: &str, query: &HashMap<String, String>) -> MockOperation {
    let body_str = |key: &str| -> String {
        request
            .body
            .as_ref()
            .and_then(|b| b.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    match (request.method, rest) {
        (Method::Get, "git/refs/heads") | (Method::Get, "git/refs/tags") => {
            MockOperation::ListRefs {
                namespace: rest.trim_start_matches("git/refs/").to_string(),
            }
        }
        (Method::Post, "git/refs") => MockOperation::CreateRef {
            name: body_str("ref"),
            sha: body_str("sha"),
        },
        (Method::Post, "git/trees") => MockOperation::CreateTree {
            base_tree: request
                .body
                .as_ref()
                .and_then(|b| b.get("base_tree"))
                .and_then(Value::as_str)
                .map(str::to_string),
            entries: request
                .body
                .as_ref()
                .and_then(|b| b.get("tree"))
                .and_then(|t| serde_json::from_value(t.clone()).ok())
                .unwrap_or_default(),
        },
        (Method::Post, "git/blobs") => MockOperation::CreateBlob {
            encoding: body_str("encoding"),
        },
        (Method::Post, "git/commits") => MockOperation::CreateCommit {
            parents: request
                .body
                .as_ref()
                .and_then(|b| b.get("parents"))
                .and_then(Value::as_array)
                .map(|ps| {
                    ps.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            tree: body_str("tree"),
            message: body_str("message"),
        },
        (Method::Get, "commits") => {
            let mut pairs: Vec<String> = query
                .iter()
                .filter(|(k, _)| k.as_str() != "page")
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            pairs.sort();
            MockOperation::ListCommits {
                query: pairs.join("&"),
            }
        }
        (method, other) => {
            if let Some(name) = other.strip_prefix("git/refs/") {
                let name = name.to_string();
                return match method {
                    Method::Get => MockOperation::GetRef { name },
                    Method::Delete => MockOperation::DeleteRef { name },
                    Method::Patch => MockOperation::UpdateRef {
                        name,
                        sha: body_str("sha"),
                    },
                    _ => MockOperation::Other {
                        method,
                        path: request.path.clone(),
                    },
                };
            }
            match (method, other.split_once('/')) {
                (Method::Get, Some(("git", sub))) => match sub.split_once('/') {
                    Some(("trees", tree_ish)) => MockOperation::GetTree {
                        tree_ish: tree_ish.to_string(),
                        recursive: query
                            .get("recursive")
                            .is_some_and(|v| v == "true" || v == "1"),
                    },
                    Some(("blobs", sha)) => MockOperation::GetBlob {
                        sha: sha.to_string(),
                        raw: request.raw,
                    },
                    Some(("commits", sha)) => MockOperation::GetCommit {
                        sha: sha.to_string(),
                    },
                    _ => MockOperation::Other {
                        method,
                        path: request.path.clone(),
                    },
                },
                _ => MockOperation::Other {
                    method,
                    path: request.path.clone(),
                },
            }
        }
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (
                percent_decode_str(k).decode_utf8_lossy().into_owned(),
                percent_decode_str(v).decode_utf8_lossy().into_owned(),
            )
        })
        .collect()
}

fn parse_body<T: for<'de> Deserialize<'de>>(request: &ApiRequest) -> Result<T, ForgeError> {
    let body = request
        .body
        .clone()
        .ok_or_else(|| unprocessable(&request.path, "Invalid request: missing body"))?;
    serde_json::from_value(body)
        .map_err(|e| unprocessable(&request.path, &format!("Invalid request: {}", e)))
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn ref_json(name: &str, sha: &Oid) -> Value {
    json!({
        "ref": format!("refs/{}", name),
        "object": { "sha": sha, "type": "commit" },
    })
}

fn commit_json(sha: &Oid, commit: &StoredCommit) -> Value {
    json!({
        "sha": sha,
        "message": commit.message,
        "tree": { "sha": commit.tree },
        "parents": commit.parents.iter().map(|p| json!({ "sha": p })).collect::<Vec<_>>(),
    })
}

fn json_response(status: u16, value: Value) -> ApiResponse {
    ApiResponse {
        status,
        headers: HashMap::new(),
        body: serde_json::to_vec(&value).unwrap_or_default(),
    }
}

fn not_found(path: &str) -> ForgeError {
    ForgeError::Status {
        status: 404,
        path: path.to_string(),
        message: "Not Found".into(),
    }
}

fn unprocessable(path: &str, message: &str) -> ForgeError {
    ForgeError::Status {
        status: 422,
        path: path.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl Transport for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.handle(&request)
    }
}
