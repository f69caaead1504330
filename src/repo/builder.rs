//! repo::builder
//!
//! Flat tree edits and the blob/tree endpoints.
//!
//! # Tree shas
//!
//! A full listing submitted without a base is authoritative. Any directory
//! entry still carrying its old sha would be reused as-is by the remote, so
//! remove and rename clear the sha of every `tree` entry and let the remote
//! rebuild directories from the surviving paths.

use serde::Deserialize;
use serde_json::json;

use super::{escape_path, Repository, Tree};
use crate::core::types::{BlobContent, EntryType, Oid, TreeEntry};
use crate::forge::{ApiRequest, ForgeError};

/// One path-level change to a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEdit {
    /// Point `path` at `blob`, creating the entry if needed.
    Upsert { path: String, blob: Oid },
    /// Drop `path` and, for a directory, everything under it.
    Remove { path: String },
    /// Move `from` (and anything under it) to `to`.
    Rename { from: String, to: String },
}

#[derive(Deserialize)]
struct Created {
    sha: Oid,
}

/// First entry whose path is exactly `path`.
///
/// ```
/// use ghtree::core::types::{Oid, TreeEntry};
/// use ghtree::repo::locate_entry;
///
/// let sha = Oid::new("b1".repeat(20)).unwrap();
/// let tree = vec![TreeEntry::file("a.txt", sha.clone())];
/// assert_eq!(locate_entry(&tree, "a.txt").and_then(|e| e.sha.clone()), Some(sha));
/// assert!(locate_entry(&tree, "b.txt").is_none());
/// ```
pub fn locate_entry<'a>(tree: &'a [TreeEntry], path: &str) -> Option<&'a TreeEntry> {
    tree.iter().find(|entry| entry.path == path)
}

/// Apply `edit` to a flat listing.
///
/// Every edit leaves `tree` entries without a sha.
pub fn apply_edit(tree: Vec<TreeEntry>, edit: &TreeEdit) -> Vec<TreeEntry> {
    let mut tree = match edit {
        TreeEdit::Upsert { path, blob } => upsert(tree, path, blob),
        TreeEdit::Remove { path } => tree
            .into_iter()
            .filter(|entry| !entry.is_at_or_under(path))
            .collect(),
        TreeEdit::Rename { from, to } => rename(tree, from, to),
    };
    for entry in tree.iter_mut().filter(|e| e.kind == EntryType::Tree) {
        entry.sha = None;
    }
    tree
}

fn upsert(tree: Vec<TreeEntry>, path: &str, blob: &Oid) -> Vec<TreeEntry> {
    // A file replaces a directory of the same name.
    let mut tree: Vec<TreeEntry> = tree
        .into_iter()
        .filter(|entry| !entry.is_at_or_under(path) || (entry.path == path && !entry.is_tree()))
        .collect();
    match tree.iter_mut().find(|entry| entry.path == path) {
        Some(entry) => entry.sha = Some(blob.clone()),
        None => tree.push(TreeEntry::file(path, blob.clone())),
    }
    tree
}

fn rename(tree: Vec<TreeEntry>, from: &str, to: &str) -> Vec<TreeEntry> {
    if from == to || !tree.iter().any(|entry| entry.path == from) {
        return tree;
    }
    tree.into_iter()
        .filter(|entry| entry.is_at_or_under(from) || !entry.is_at_or_under(to))
        .map(|mut entry| {
            if entry.is_at_or_under(from) {
                entry.path = format!("{}{}", to, &entry.path[from.len()..]);
            }
            entry
        })
        .collect()
}

impl Repository {
    /// Recursive listing of a tree (tree id, commit id or branch name).
    ///
    /// # Errors
    ///
    /// `Truncated` if the remote did not return the complete listing.
    pub async fn fetch_flat_tree(&self, tree_ish: &str) -> Result<Vec<TreeEntry>, ForgeError> {
        let tree: Tree = self
            .get_json(self.path(&format!(
                "git/trees/{}?recursive=true",
                escape_path(tree_ish)
            )))
            .await?;
        if tree.truncated {
            tracing::warn!(tree = %tree_ish, entries = tree.tree.len(), "recursive tree listing truncated");
            return Err(ForgeError::Truncated {
                tree_ish: tree_ish.to_string(),
                entries: tree.tree.len(),
            });
        }
        Ok(tree.tree)
    }

    pub async fn create_blob(&self, content: &BlobContent) -> Result<Oid, ForgeError> {
        let path = self.path("git/blobs");
        let encoded = content.encode();
        let body = serde_json::to_value(&encoded).map_err(|e| ForgeError::InvalidRequest(e.to_string()))?;
        let response = self
            .transport
            .send(ApiRequest::post(path.clone()).json(body))
            .await?;
        let created: Created = response.json(&path)?;
        tracing::debug!(sha = %created.sha.short(7), bytes = content.len(), "blob created");
        Ok(created.sha)
    }

    /// Create a tree from `entries`, over `base_tree` when given.
    pub async fn create_tree(
        &self,
        entries: &[TreeEntry],
        base_tree: Option<&Oid>,
    ) -> Result<Oid, ForgeError> {
        let path = self.path("git/trees");
        let body = match base_tree {
            Some(base) => json!({ "base_tree": base, "tree": entries }),
            None => json!({ "tree": entries }),
        };
        let response = self
            .transport
            .send(ApiRequest::post(path.clone()).json(body))
            .await?;
        let created: Created = response.json(&path)?;
        tracing::debug!(sha = %created.sha.short(7), entries = entries.len(), "tree created");
        Ok(created.sha)
    }

    /// Root tree of a commit.
    pub async fn commit_tree(&self, commit: &Oid) -> Result<Oid, ForgeError> {
        Ok(self.get_commit(commit).await?.tree)
    }

    /// BuildTree: a new root tree with `edit` applied on top of `base_commit`.
    ///
    /// An upsert is sent as a one-entry delta over the base commit's tree.
    /// Remove and rename rewrite the full listing and send it with no base.
    pub async fn build_tree(&self, base_commit: &Oid, edit: &TreeEdit) -> Result<Oid, ForgeError> {
        match edit {
            TreeEdit::Upsert { path, blob } => {
                let base = self.commit_tree(base_commit).await?;
                tracing::debug!(base = %base.short(7), path = %path, "building delta tree");
                let delta = [TreeEntry::file(path.as_str(), blob.clone())];
                self.create_tree(&delta, Some(&base)).await
            }
            TreeEdit::Remove { .. } | TreeEdit::Rename { .. } => {
                let flat = self.fetch_flat_tree(base_commit.as_str()).await?;
                tracing::debug!(base = %base_commit.short(7), entries = flat.len(), ?edit, "rewriting tree");
                let edited = apply_edit(flat, edit);
                self.create_tree(&edited, None).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(c: char) -> Oid {
        Oid::new(c.to_string().repeat(40)).unwrap()
    }

    fn listing() -> Vec<TreeEntry> {
        vec![
            TreeEntry::file("a.txt", oid('1')),
            TreeEntry::directory("docs", Some(oid('2'))),
            TreeEntry::file("docs/guide.md", oid('3')),
            TreeEntry::directory("docs/api", Some(oid('4'))),
            TreeEntry::file("docs/api/index.md", oid('5')),
            TreeEntry::file("docsets.txt", oid('6')),
        ]
    }

    fn paths(tree: &[TreeEntry]) -> Vec<&str> {
        tree.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn locate_returns_first_match() {
        let mut tree = listing();
        tree.push(TreeEntry::file("a.txt", oid('9')));
        assert_eq!(locate_entry(&tree, "a.txt").unwrap().sha, Some(oid('1')));
        assert!(locate_entry(&tree, "docs/").is_none());
    }

    #[test]
    fn remove_file_clears_tree_shas() {
        let edited = apply_edit(
            listing(),
            &TreeEdit::Remove {
                path: "docs/guide.md".into(),
            },
        );
        assert!(locate_entry(&edited, "docs/guide.md").is_none());
        assert!(edited.iter().filter(|e| e.is_tree()).all(|e| e.sha.is_none()));
        assert_eq!(locate_entry(&edited, "a.txt").unwrap().sha, Some(oid('1')));
    }

    #[test]
    fn remove_directory_takes_descendants_only() {
        let edited = apply_edit(listing(), &TreeEdit::Remove { path: "docs".into() });
        assert_eq!(paths(&edited), vec!["a.txt", "docsets.txt"]);
    }

    #[test]
    fn remove_missing_path_keeps_entries() {
        let edited = apply_edit(listing(), &TreeEdit::Remove { path: "nope".into() });
        assert_eq!(edited.len(), listing().len());
    }

    #[test]
    fn rename_file_in_place() {
        let edited = apply_edit(
            listing(),
            &TreeEdit::Rename {
                from: "a.txt".into(),
                to: "docs/a.txt".into(),
            },
        );
        assert_eq!(paths(&edited)[0], "docs/a.txt");
        assert_eq!(locate_entry(&edited, "docs/a.txt").unwrap().sha, Some(oid('1')));
        assert!(locate_entry(&edited, "a.txt").is_none());
    }

    #[test]
    fn rename_directory_moves_children() {
        let edited = apply_edit(
            listing(),
            &TreeEdit::Rename {
                from: "docs".into(),
                to: "manual".into(),
            },
        );
        assert_eq!(
            paths(&edited),
            vec![
                "a.txt",
                "manual",
                "manual/guide.md",
                "manual/api",
                "manual/api/index.md",
                "docsets.txt"
            ]
        );
    }

    #[test]
    fn rename_replaces_destination() {
        let edited = apply_edit(
            listing(),
            &TreeEdit::Rename {
                from: "a.txt".into(),
                to: "docsets.txt".into(),
            },
        );
        let hits: Vec<_> = edited.iter().filter(|e| e.path == "docsets.txt").collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sha, Some(oid('1')));
    }

    #[test]
    fn rename_missing_source_is_noop_apart_from_tree_shas() {
        let edited = apply_edit(
            listing(),
            &TreeEdit::Rename {
                from: "ghost".into(),
                to: "a.txt".into(),
            },
        );
        assert_eq!(paths(&edited), paths(&listing()));
        assert_eq!(locate_entry(&edited, "a.txt").unwrap().sha, Some(oid('1')));
    }

    #[test]
    fn upsert_replaces_or_appends() {
        let replaced = apply_edit(
            listing(),
            &TreeEdit::Upsert {
                path: "a.txt".into(),
                blob: oid('a'),
            },
        );
        assert_eq!(locate_entry(&replaced, "a.txt").unwrap().sha, Some(oid('a')));
        assert_eq!(replaced.len(), listing().len());

        let appended = apply_edit(
            listing(),
            &TreeEdit::Upsert {
                path: "new.txt".into(),
                blob: oid('b'),
            },
        );
        assert_eq!(appended.last().unwrap().path, "new.txt");
    }

    #[test]
    fn upsert_over_directory_drops_it() {
        let edited = apply_edit(
            listing(),
            &TreeEdit::Upsert {
                path: "docs".into(),
                blob: oid('c'),
            },
        );
        assert_eq!(paths(&edited), vec!["a.txt", "docsets.txt", "docs"]);
        assert_eq!(locate_entry(&edited, "docs").unwrap().kind, EntryType::Blob);
    }
}
