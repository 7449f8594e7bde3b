//! GitOpsRepo CRD types and the aggregated repo-content shape
//!
//! The GitOpsRepo is the per-namespace sink: once every policy and
//! assignment reports Ready, the reconciler aggregates all
//! AssignmentPackages into a [`RepoContent`] tree, hashes it, and publishes
//! it as a pull request. `status.repoContentHash` is the idempotence anchor:
//! at most one PR per distinct hash.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::assignment_package::AssignmentPackageSpec;
use super::base_repo::BaseRepoSpec;
use super::types::ManifestsSpec;
use crate::conditions::Condition;

/// The downstream repository manifests are published into
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "GitOpsRepo",
    plural = "gitopsrepoes",
    namespaced,
    status = "GitOpsRepoStatus",
    printcolumn = r#"{"name":"Hash","type":"string","jsonPath":".status.repoContentHash"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsRepoSpec {
    /// Repository, base branch and path manifests are committed to
    #[serde(flatten)]
    pub manifests: ManifestsSpec,
}

/// Status of a GitOpsRepo
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsRepoStatus {
    /// Structural hash (decimal) of the last published repo content
    #[serde(default)]
    pub repo_content_hash: String,

    /// `Ready` plus the transient `ReadyToPR` debounce condition
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Everything one commit to the downstream repository contains.
///
/// Maps are ordered so hashing and tree planning are deterministic.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct RepoContent {
    /// Cluster-type folders; present even when a cluster type has no
    /// scheduled targets yet
    pub cluster_types: BTreeMap<String, ClusterContent>,

    /// Tracked upstream repo, when one is registered in the namespace
    pub base_repo: Option<BaseRepoSpec>,
}

/// Per-cluster-type slice of [`RepoContent`].
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ClusterContent {
    /// Deployment targets scheduled on the cluster type, by name
    pub deployment_targets: BTreeMap<String, AssignmentPackageSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_string_of;

    #[test]
    fn gitops_repo_spec_is_flat() {
        let spec: GitOpsRepoSpec = serde_json::from_value(serde_json::json!({
            "repo": "https://github.com/org/gitops",
            "branch": "dev",
            "path": "."
        }))
        .unwrap();
        assert_eq!(spec.manifests.branch, "dev");
    }

    #[test]
    fn repo_content_hash_ignores_insertion_order() {
        let mut a = RepoContent::default();
        a.cluster_types.insert("drone".into(), ClusterContent::default());
        a.cluster_types.insert("large".into(), ClusterContent::default());

        let mut b = RepoContent::default();
        b.cluster_types.insert("large".into(), ClusterContent::default());
        b.cluster_types.insert("drone".into(), ClusterContent::default());

        assert_eq!(hash_string_of(&a).unwrap(), hash_string_of(&b).unwrap());
    }

    #[test]
    fn repo_content_hash_tracks_package_changes() {
        let mut content = RepoContent::default();
        let mut cluster = ClusterContent::default();
        cluster.deployment_targets.insert(
            "app1-test".into(),
            AssignmentPackageSpec {
                config_manifests: vec!["foo: bar\n".into()],
                ..Default::default()
            },
        );
        content.cluster_types.insert("drone".into(), cluster);
        let before = hash_string_of(&content).unwrap();

        content
            .cluster_types
            .get_mut("drone")
            .unwrap()
            .deployment_targets
            .get_mut("app1-test")
            .unwrap()
            .config_manifests = vec!["foo: baz\n".into()];
        let after = hash_string_of(&content).unwrap();

        assert_ne!(before, after);
    }
}
