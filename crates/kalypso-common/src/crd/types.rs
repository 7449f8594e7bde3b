//! Shared spec fragments

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A git location: repository URL, branch and path within the tree.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestsSpec {
    /// Repository URL (e.g. `https://github.com/org/repo`)
    pub repo: String,

    /// Branch name
    pub branch: String,

    /// Path within the repository
    pub path: String,
}

/// Content type of rendered manifests; decides the file extension in the
/// downstream GitOps repository (`env` becomes `.sh`).
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// YAML documents (default)
    #[default]
    Yaml,
    /// Shell-exportable environment file
    Env,
}

impl ContentType {
    /// File extension used in the downstream repository tree.
    pub fn extension(&self) -> &'static str {
        match self {
            ContentType::Yaml => "yaml",
            ContentType::Env => "sh",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Yaml => write!(f, "yaml"),
            ContentType::Env => write!(f, "env"),
        }
    }
}

/// Tracking state of the GitHub issue mirroring an assignment failure.
///
/// `content_hash` is the structural hash of the last posted body; the issue
/// is only edited when the hash changes, which keeps a failing reconcile
/// loop from flooding the tracker.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitIssueStatus {
    /// Number of the open issue, if one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_no: Option<u64>,

    /// Structural hash of the last issue body (decimal string)
    #[serde(default)]
    pub content_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_default_is_yaml() {
        assert_eq!(ContentType::default(), ContentType::Yaml);
        assert_eq!(ContentType::default().extension(), "yaml");
        assert_eq!(ContentType::Env.extension(), "sh");
    }

    #[test]
    fn content_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ContentType::Yaml).unwrap(), "\"yaml\"");
        assert_eq!(serde_json::to_string(&ContentType::Env).unwrap(), "\"env\"");
        let parsed: ContentType = serde_json::from_str("\"env\"").unwrap();
        assert_eq!(parsed, ContentType::Env);
    }

    #[test]
    fn manifests_spec_uses_camel_case() {
        let spec: ManifestsSpec = serde_json::from_value(serde_json::json!({
            "repo": "https://github.com/org/gitops",
            "branch": "main",
            "path": "."
        }))
        .unwrap();
        assert_eq!(spec.branch, "main");
    }
}
