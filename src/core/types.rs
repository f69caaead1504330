//! core::types
//!
//! Strong types for the object-graph domain.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated reference name relative to `refs/`
//! - [`TreeEntry`] - One row of a flat (recursive) tree listing
//! - [`BlobContent`] - Text or binary file payload
//! - [`Author`] - Commit identity
//! - [`RefUpdatePolicy`] - Fast-forward or compare-and-swap ref updates
//!
//! # Examples
//!
//! ```
//! use ghtree::core::types::{BranchName, Oid, RefName};
//!
//! let branch = BranchName::new("feature/my-branch").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let refname = RefName::for_branch(&branch);
//! assert_eq!(refname.as_str(), "heads/feature/my-branch");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! # let _ = oid;
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("invalid blob encoding: {0}")]
    InvalidEncoding(String),
}

/// Check a name against Git's refname rules (see `git check-ref-format`).
///
/// Returns a human-readable reason on failure; callers wrap it in the
/// variant matching what they were validating.
fn check_refname(name: &str, what: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }
    if name == "@" {
        return Err(format!("{what} cannot be '@' (reserved)"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(format!("{what} cannot start or end with '/'"));
    }
    if name.starts_with('-') {
        return Err(format!("{what} cannot start with '-'"));
    }
    for bad in ["..", "@{", "//"] {
        if name.contains(bad) {
            return Err(format!("{what} cannot contain '{bad}'"));
        }
    }

    const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(format!("{what} cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err(format!("{what} cannot contain control characters"));
    }

    for component in name.split('/') {
        if component.starts_with('.') {
            return Err("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Err("path component cannot end with '.lock'".into());
        }
    }

    Ok(())
}

/// A validated Git branch name.
///
/// # Example
///
/// ```
/// use ghtree::core::types::BranchName;
///
/// let name = BranchName::new("feature/my-branch").unwrap();
/// assert_eq!(name.as_str(), "feature/my-branch");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        check_refname(&name, "branch name").map_err(TypeError::InvalidBranchName)?;
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git object identifier.
///
/// OIDs are normalized to lowercase for consistency.
///
/// ```
/// use ghtree::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64
    /// character hex id.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Abbreviated form, at most `len` characters.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference name relative to `refs/`, as the refs API addresses it.
///
/// The hosting API takes `heads/main` in URL paths but `refs/heads/main`
/// in create-ref bodies; [`RefName::full`] produces the latter.
///
/// ```
/// use ghtree::core::types::{BranchName, RefName};
///
/// let refname = RefName::for_branch(&BranchName::new("main").unwrap());
/// assert_eq!(refname.as_str(), "heads/main");
/// assert_eq!(refname.full(), "refs/heads/main");
///
/// // A leading "refs/" is accepted and stripped.
/// assert_eq!(RefName::new("refs/tags/v1.0").unwrap().as_str(), "tags/v1.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let name = name.strip_prefix("refs/").map(str::to_string).unwrap_or(name);
        check_refname(&name, "ref name").map_err(TypeError::InvalidRefName)?;
        Ok(Self(name))
    }

    /// The ref for a branch (`heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("heads/{}", branch.as_str()))
    }

    /// The fully qualified name (`refs/<name>`).
    pub fn full(&self) -> String {
        format!("refs/{}", self.0)
    }

    /// The branch this ref names, if it lives under `heads/`.
    pub fn branch(&self) -> Option<&str> {
        self.0.strip_prefix("heads/")
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object type of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Blob,
    Tree,
    /// Submodule pointer.
    Commit,
}

/// File mode of a tree entry, in Git's octal string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    #[serde(rename = "100644")]
    File,
    #[serde(rename = "100755")]
    Executable,
    #[serde(rename = "040000")]
    Directory,
    #[serde(rename = "160000")]
    Submodule,
    #[serde(rename = "120000")]
    Symlink,
}

impl EntryMode {
    /// The object type an entry with this mode points at.
    pub fn entry_type(self) -> EntryType {
        match self {
            EntryMode::File | EntryMode::Executable | EntryMode::Symlink => EntryType::Blob,
            EntryMode::Directory => EntryType::Tree,
            EntryMode::Submodule => EntryType::Commit,
        }
    }
}

/// One row of a flat tree listing.
///
/// `sha` is `None` when the remote must recompute the object from its
/// children; it is omitted from the serialized form in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: EntryMode,
    #[serde(rename = "type")]
    pub kind: EntryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<Oid>,
}

impl TreeEntry {
    /// A regular file entry pointing at `sha`.
    pub fn file(path: impl Into<String>, sha: Oid) -> Self {
        Self {
            path: path.into(),
            mode: EntryMode::File,
            kind: EntryType::Blob,
            sha: Some(sha),
        }
    }

    /// A directory entry; `sha` may be `None` to request recomputation.
    pub fn directory(path: impl Into<String>, sha: Option<Oid>) -> Self {
        Self {
            path: path.into(),
            mode: EntryMode::Directory,
            kind: EntryType::Tree,
            sha,
        }
    }

    pub fn is_tree(&self) -> bool {
        self.kind == EntryType::Tree
    }

    /// True if this entry is `path` itself or lives underneath it.
    pub fn is_at_or_under(&self, path: &str) -> bool {
        self.path == path
            || self
                .path
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// File payload: UTF-8 text or arbitrary bytes.
///
/// The variant only selects the wire encoding. Two payloads are equal when
/// their bytes are, so `Binary(b"abc")` equals `Text("abc")`.
#[derive(Debug, Clone)]
pub enum BlobContent {
    Text(String),
    Binary(Vec<u8>),
}

impl PartialEq for BlobContent {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for BlobContent {}

impl BlobContent {
    /// Classify raw bytes: valid UTF-8 becomes `Text`, anything else `Binary`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => BlobContent::Text(text),
            Err(e) => BlobContent::Binary(e.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BlobContent::Text(s) => s.as_bytes(),
            BlobContent::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// The wire form submitted to the create-blob endpoint.
    pub fn encode(&self) -> EncodedBlob {
        match self {
            BlobContent::Text(s) => EncodedBlob {
                content: s.clone(),
                encoding: BlobEncoding::Utf8,
            },
            BlobContent::Binary(b) => EncodedBlob {
                content: STANDARD.encode(b),
                encoding: BlobEncoding::Base64,
            },
        }
    }
}

impl From<&str> for BlobContent {
    fn from(s: &str) -> Self {
        BlobContent::Text(s.to_string())
    }
}

impl From<String> for BlobContent {
    fn from(s: String) -> Self {
        BlobContent::Text(s)
    }
}

impl From<Vec<u8>> for BlobContent {
    fn from(b: Vec<u8>) -> Self {
        BlobContent::Binary(b)
    }
}

/// Blob transfer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

/// `{content, encoding}` as exchanged with the blobs endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedBlob {
    pub content: String,
    pub encoding: BlobEncoding,
}

impl EncodedBlob {
    /// Decode back into content.
    ///
    /// Base64 payloads may contain line breaks (the hosting API wraps them).
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidEncoding` if a base64 payload is malformed.
    pub fn decode(&self) -> Result<BlobContent, TypeError> {
        match self.encoding {
            BlobEncoding::Utf8 => Ok(BlobContent::Text(self.content.clone())),
            BlobEncoding::Base64 => {
                let compact: String = self
                    .content
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                STANDARD
                    .decode(compact)
                    .map(BlobContent::Binary)
                    .map_err(|e| TypeError::InvalidEncoding(e.to_string()))
            }
        }
    }
}

/// Commit author identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// How a branch ref is advanced after a commit is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefUpdatePolicy {
    /// Send the update and let the remote reject non-fast-forwards.
    #[default]
    FastForward,
    /// Re-read the live ref first and fail with a conflict if it moved.
    CompareAndSwap,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_branch_names() {
            assert!(BranchName::new("main").is_ok());
            assert!(BranchName::new("feature/foo").is_ok());
            assert!(BranchName::new("user@feature").is_ok());
            assert!(BranchName::new("with.dot").is_ok());
        }

        #[test]
        fn invalid_branch_names() {
            assert!(BranchName::new("").is_err());
            assert!(BranchName::new("@").is_err());
            assert!(BranchName::new("-flag").is_err());
            assert!(BranchName::new("foo/.hidden").is_err());
            assert!(BranchName::new("foo/bar.lock").is_err());
            assert!(BranchName::new("branch/").is_err());
            assert!(BranchName::new("bad..path").is_err());
            assert!(BranchName::new("foo@{bar").is_err());
            assert!(BranchName::new("has~tilde").is_err());
            assert!(BranchName::new("has\ttab").is_err());
        }

        #[test]
        fn serde_roundtrip() {
            let name = BranchName::new("feature/test").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, "\"feature/test\"");
            let parsed: BranchName = serde_json::from_str(&json).unwrap();
            assert_eq!(name, parsed);
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn lowercases_and_validates() {
            let oid = Oid::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
            assert_eq!(oid.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
            assert!(Oid::new("a".repeat(64)).is_ok());
        }

        #[test]
        fn deserialize_rejects_malformed() {
            let result: Result<Oid, _> = serde_json::from_str("\"nope\"");
            assert!(result.is_err());
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn strips_refs_prefix() {
            let r = RefName::new("refs/heads/main").unwrap();
            assert_eq!(r.as_str(), "heads/main");
            assert_eq!(r.branch(), Some("main"));
            assert_eq!(r.full(), "refs/heads/main");
        }

        #[test]
        fn tag_is_not_branch() {
            let r = RefName::new("tags/v1.0").unwrap();
            assert_eq!(r.branch(), None);
        }

        #[test]
        fn rejects_invalid() {
            assert!(RefName::new("").is_err());
            assert!(RefName::new("heads/a b").is_err());
        }
    }

    mod tree_entry {
        use super::*;

        fn sha(c: char) -> Oid {
            Oid::new(c.to_string().repeat(40)).unwrap()
        }

        #[test]
        fn serializes_in_wire_shape() {
            let entry = TreeEntry::file("a.txt", sha('b'));
            let json = serde_json::to_value(&entry).unwrap();
            assert_eq!(
                json,
                serde_json::json!({
                    "path": "a.txt",
                    "mode": "100644",
                    "type": "blob",
                    "sha": "b".repeat(40),
                })
            );
        }

        #[test]
        fn omits_cleared_sha() {
            let entry = TreeEntry::directory("src", None);
            let json = serde_json::to_value(&entry).unwrap();
            assert!(json.get("sha").is_none());
            assert_eq!(json["mode"], "040000");
            assert_eq!(json["type"], "tree");
        }

        #[test]
        fn deserializes_listing_row_with_extra_fields() {
            let json = serde_json::json!({
                "path": "src/lib.rs",
                "mode": "100644",
                "type": "blob",
                "sha": "c".repeat(40),
                "size": 12,
                "url": "https://example.invalid"
            });
            let entry: TreeEntry = serde_json::from_value(json).unwrap();
            assert_eq!(entry.path, "src/lib.rs");
            assert_eq!(entry.kind, EntryType::Blob);
        }

        #[test]
        fn at_or_under_respects_component_boundaries() {
            let entry = TreeEntry::file("docs/guide.md", sha('a'));
            assert!(entry.is_at_or_under("docs"));
            assert!(entry.is_at_or_under("docs/guide.md"));
            assert!(!entry.is_at_or_under("doc"));
            assert!(!entry.is_at_or_under("docs/guide"));
        }
    }

    mod blob_content {
        use super::*;

        #[test]
        fn text_encodes_as_utf8() {
            let encoded = BlobContent::from("hello").encode();
            assert_eq!(encoded.encoding, BlobEncoding::Utf8);
            assert_eq!(encoded.content, "hello");
            let json = serde_json::to_value(&encoded).unwrap();
            assert_eq!(json["encoding"], "utf-8");
        }

        #[test]
        fn binary_encodes_as_base64() {
            let encoded = BlobContent::Binary(vec![0, 159, 146, 150]).encode();
            assert_eq!(encoded.encoding, BlobEncoding::Base64);
            assert_eq!(encoded.content, "AJ+Slg==");
            assert_eq!(
                encoded.decode().unwrap(),
                BlobContent::Binary(vec![0, 159, 146, 150])
            );
        }

        #[test]
        fn decode_tolerates_wrapped_base64() {
            let encoded = EncodedBlob {
                content: "aGVs\nbG8=\n".to_string(),
                encoding: BlobEncoding::Base64,
            };
            assert_eq!(encoded.decode().unwrap().as_bytes(), b"hello");
        }

        #[test]
        fn from_bytes_classifies() {
            assert!(matches!(
                BlobContent::from_bytes(b"plain".to_vec()),
                BlobContent::Text(t) if t == "plain"
            ));
            assert!(matches!(
                BlobContent::from_bytes(vec![0xff, 0xfe]),
                BlobContent::Binary(b) if b == [0xff, 0xfe]
            ));
        }

        #[test]
        fn equality_compares_bytes() {
            assert_eq!(
                BlobContent::Binary(b"abc".to_vec()),
                BlobContent::Text("abc".into())
            );
            assert_ne!(BlobContent::Binary(vec![0xff]), BlobContent::Text("abc".into()));
        }
    }

    mod ref_update_policy {
        use super::*;

        #[test]
        fn kebab_case_names() {
            let p: RefUpdatePolicy = serde_json::from_str("\"compare-and-swap\"").unwrap();
            assert_eq!(p, RefUpdatePolicy::CompareAndSwap);
            assert_eq!(
                serde_json::to_string(&RefUpdatePolicy::FastForward).unwrap(),
                "\"fast-forward\""
            );
            assert_eq!(RefUpdatePolicy::default(), RefUpdatePolicy::FastForward);
        }

        #[test]
        fn author_display() {
            assert_eq!(
                Author::new("Jane", "jane@example.com").to_string(),
                "Jane <jane@example.com>"
            );
        }
    }
}
