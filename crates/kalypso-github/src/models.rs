//! Wire models for the GitHub REST v3 surface the adapter touches

use serde::{Deserialize, Serialize};

/// A git reference (`refs/heads/...`).
#[derive(Clone, Debug, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub object: GitObject,
}

/// The object a reference points at.
#[derive(Clone, Debug, Deserialize)]
pub struct GitObject {
    pub sha: String,
}

/// A tree listing, possibly recursive.
#[derive(Clone, Debug, Deserialize)]
pub struct GitTree {
    pub sha: String,
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// One entry of an existing tree.
#[derive(Clone, Debug, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub sha: Option<String>,
}

impl TreeEntry {
    /// Convenience constructor for tests and the mock remote.
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry_type: "blob".to_string(),
            sha: Some(sha.into()),
        }
    }
}

/// One entry of a tree about to be created.
///
/// `content: None` together with `sha: Some(None)` serializes `"sha": null`,
/// which the API treats as a file deletion.
#[derive(Clone, Debug, Serialize)]
pub struct NewTreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<Option<String>>,
}

impl NewTreeEntry {
    /// A regular-file write.
    pub fn write(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644".to_string(),
            entry_type: "blob".to_string(),
            content: Some(content.into()),
            sha: None,
        }
    }

    /// A file deletion.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644".to_string(),
            entry_type: "blob".to_string(),
            content: None,
            sha: Some(None),
        }
    }
}

/// A blob body as returned by the git data API (base64 with line wraps).
#[derive(Clone, Debug, Deserialize)]
pub struct GitBlob {
    pub content: String,
    pub encoding: String,
}

/// A created git commit.
#[derive(Clone, Debug, Deserialize)]
pub struct GitCommit {
    pub sha: String,
}

/// A repository commit (only the SHA is consumed).
#[derive(Clone, Debug, Deserialize)]
pub struct RepoCommit {
    pub sha: String,
}

/// Commit author metadata.
#[derive(Clone, Debug, Serialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub date: String,
}

/// A pull request, trimmed to the fields the adapter reads.
#[derive(Clone, Debug, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head: PullRequestRef,
    pub base: PullRequestRef,
}

/// Head/base branch of a pull request.
#[derive(Clone, Debug, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// An issue, trimmed to the fields the adapter reads.
#[derive(Clone, Debug, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub state: String,
}
