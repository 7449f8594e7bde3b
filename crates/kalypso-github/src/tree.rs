//! Commit tree planning
//!
//! Computes the set of writes and deletions that reshape the downstream
//! repository into the aggregated repo content, without touching anything
//! outside the scheduler's folders: dot-prefixed root folders (`.github`
//! and friends) are never pruned, and the promotion tracking blob is only
//! rewritten when the tracked commit actually changed.

use std::collections::BTreeMap;

use kalypso_common::crd::{AssignmentPackageSpec, RepoContent};

use crate::models::{NewTreeEntry, TreeEntry};

/// Path of the promotion tracking blob.
pub const PROMOTED_COMMIT_ID_PATH: &str = ".github/tracking/Promoted_Commit_Id";
/// Label attached to promoted pull requests.
pub const PROMOTED_LABEL: &str = "promoted";
/// Per-cluster-type README file name.
pub const README_FILENAME: &str = "README.md";
/// Per-cluster-type README content.
pub const README_CONTENT: &str =
    "This folder contains deployment targets scheduled on the cluster type";

/// The planned changes for one commit.
#[derive(Debug, Default)]
pub struct TreePlan {
    /// Tree entries in API shape; deletions carry `sha: null`
    pub entries: Vec<NewTreeEntry>,
    /// Whether this commit rewrites the promotion tracking blob
    pub is_promoted: bool,
}

/// Join manifest documents with the YAML document separator.
pub fn join_manifests(manifests: &[String]) -> String {
    let mut joined = String::new();
    for manifest in manifests {
        if !joined.is_empty() {
            joined.push_str("---\n");
        }
        joined.push_str(manifest);
    }
    joined
}

/// Plan the tree for one commit.
///
/// `existing` is the recursive listing of the branch being committed to;
/// `existing_promoted` the current content of the tracking blob, if any.
pub fn plan_tree(
    existing: &[TreeEntry],
    existing_promoted: Option<&str>,
    content: &RepoContent,
) -> TreePlan {
    let mut plan = TreePlan::default();

    // prune blobs that no longer correspond to scheduled content
    for entry in existing {
        if entry.entry_type != "blob" {
            continue;
        }
        let segments: Vec<&str> = entry.path.split('/').collect();
        if segments.len() < 2 {
            continue; // root-level files are not ours
        }
        let cluster_type_folder = segments[0];
        if cluster_type_folder.starts_with('.') {
            continue; // .github and friends
        }

        let keep = match content.cluster_types.get(cluster_type_folder) {
            Some(cluster_content) => {
                let second = segments[1];
                second == README_FILENAME
                    || cluster_content.deployment_targets.contains_key(second)
            }
            None => false,
        };

        if !keep {
            tracing::info!(path = %entry.path, "deleting stale file");
            plan.entries.push(NewTreeEntry::delete(&entry.path));
        }
    }

    // promotion tracking marker
    if let Some(base_repo) = &content.base_repo {
        let commit = base_repo.commit.as_str();
        if !commit.is_empty() && existing_promoted != Some(commit) {
            plan.entries
                .push(NewTreeEntry::write(PROMOTED_COMMIT_ID_PATH, commit));
            plan.is_promoted = true;
        }
    }

    // scheduled content
    for (cluster_type, cluster_content) in &content.cluster_types {
        for (target, package) in &cluster_content.deployment_targets {
            let folder = format!("{cluster_type}/{target}");
            plan.entries.extend(package_entries(&folder, package));
        }
        plan.entries.push(NewTreeEntry::write(
            format!("{cluster_type}/{README_FILENAME}"),
            README_CONTENT,
        ));
    }

    plan
}

/// The files one assignment package writes under its target folder.
fn package_entries(folder: &str, package: &AssignmentPackageSpec) -> Vec<NewTreeEntry> {
    let mut entries = Vec::with_capacity(3);

    entries.push(NewTreeEntry::write(
        format!("{folder}/reconciler.yaml"),
        join_manifests(&package.reconciler_manifests),
    ));
    entries.push(NewTreeEntry::write(
        format!("{folder}/namespace.yaml"),
        join_manifests(&package.namespace_manifests),
    ));

    let config = join_manifests(&package.config_manifests);
    if !config.is_empty() {
        let extension = package.config_manifests_content_type.extension();
        entries.push(NewTreeEntry::write(
            format!("{folder}/config.{extension}"),
            config,
        ));
    }

    entries
}

/// Apply a plan to a path → content map. Used by the in-memory remote and
/// by tests to observe the resulting repository layout.
pub fn apply_plan(files: &mut BTreeMap<String, String>, plan: &TreePlan) {
    for entry in &plan.entries {
        match &entry.content {
            Some(content) => {
                files.insert(entry.path.clone(), content.clone());
            }
            None => {
                files.remove(&entry.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kalypso_common::crd::{BaseRepoSpec, ClusterContent, ContentType};

    fn package(config: &[&str], content_type: ContentType) -> AssignmentPackageSpec {
        AssignmentPackageSpec {
            reconciler_manifests: vec!["kind: GitRepository\n".into(), "kind: Kustomization\n".into()],
            namespace_manifests: vec!["kind: Namespace\n".into()],
            config_manifests: config.iter().map(|c| c.to_string()).collect(),
            config_manifests_content_type: content_type,
        }
    }

    fn content_with(cluster_type: &str, target: &str, package_spec: AssignmentPackageSpec) -> RepoContent {
        let mut cluster = ClusterContent::default();
        cluster
            .deployment_targets
            .insert(target.to_string(), package_spec);
        let mut content = RepoContent::default();
        content
            .cluster_types
            .insert(cluster_type.to_string(), cluster);
        content
    }

    #[test]
    fn join_manifests_uses_yaml_document_separator() {
        assert_eq!(join_manifests(&[]), "");
        assert_eq!(join_manifests(&["a\n".into()]), "a\n");
        assert_eq!(
            join_manifests(&["a\n".into(), "b\n".into()]),
            "a\n---\nb\n"
        );
    }

    #[test]
    fn writes_full_target_layout() {
        let content = content_with("drone", "app1-test", package(&["foo: bar\n"], ContentType::Yaml));
        let plan = plan_tree(&[], None, &content);

        let files: BTreeMap<&str, &str> = plan
            .entries
            .iter()
            .map(|e| (e.path.as_str(), e.content.as_deref().unwrap()))
            .collect();

        assert_eq!(
            files["drone/app1-test/reconciler.yaml"],
            "kind: GitRepository\n---\nkind: Kustomization\n"
        );
        assert_eq!(files["drone/app1-test/namespace.yaml"], "kind: Namespace\n");
        assert_eq!(files["drone/app1-test/config.yaml"], "foo: bar\n");
        assert_eq!(files["drone/README.md"], README_CONTENT);
        assert!(!plan.is_promoted);
    }

    #[test]
    fn env_config_gets_sh_extension() {
        let content = content_with(
            "edge",
            "app1-test",
            package(&["export FOO=\"bar\"\n"], ContentType::Env),
        );
        let plan = plan_tree(&[], None, &content);
        assert!(plan
            .entries
            .iter()
            .any(|e| e.path == "edge/app1-test/config.sh"));
        assert!(!plan.entries.iter().any(|e| e.path.ends_with("config.yaml")));
    }

    #[test]
    fn empty_config_is_omitted() {
        let content = content_with("drone", "app1-test", package(&[], ContentType::Yaml));
        let plan = plan_tree(&[], None, &content);
        assert!(!plan.entries.iter().any(|e| e.path.contains("config.")));
        assert!(plan
            .entries
            .iter()
            .any(|e| e.path == "drone/app1-test/reconciler.yaml"));
    }

    #[test]
    fn stale_targets_are_deleted_and_readme_kept() {
        // repository currently carries app1-test and app2-test; app2 was
        // unscheduled
        let existing = vec![
            TreeEntry::blob("drone/README.md", "s0"),
            TreeEntry::blob("drone/app1-test/reconciler.yaml", "s1"),
            TreeEntry::blob("drone/app2-test/reconciler.yaml", "s2"),
            TreeEntry::blob("drone/app2-test/namespace.yaml", "s3"),
        ];
        let content = content_with("drone", "app1-test", package(&[], ContentType::Yaml));
        let plan = plan_tree(&existing, None, &content);

        let deletions: Vec<&str> = plan
            .entries
            .iter()
            .filter(|e| e.content.is_none())
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(
            deletions,
            vec![
                "drone/app2-test/reconciler.yaml",
                "drone/app2-test/namespace.yaml"
            ]
        );
    }

    #[test]
    fn unknown_cluster_type_folders_are_pruned() {
        let existing = vec![TreeEntry::blob("retired/app1-test/reconciler.yaml", "s1")];
        let content = content_with("drone", "app1-test", package(&[], ContentType::Yaml));
        let plan = plan_tree(&existing, None, &content);
        assert!(plan
            .entries
            .iter()
            .any(|e| e.path == "retired/app1-test/reconciler.yaml" && e.content.is_none()));
    }

    #[test]
    fn dotfile_folders_and_root_files_survive() {
        let existing = vec![
            TreeEntry::blob(".github/workflows/ci.yaml", "s1"),
            TreeEntry::blob("README.md", "s2"),
        ];
        let plan = plan_tree(&existing, None, &RepoContent::default());
        assert!(plan.entries.iter().all(|e| e.content.is_some()));
    }

    #[test]
    fn empty_cluster_types_still_seed_readme_folders() {
        let mut content = RepoContent::default();
        content
            .cluster_types
            .insert("drone".into(), ClusterContent::default());
        let plan = plan_tree(&[], None, &content);
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].path, "drone/README.md");
    }

    #[test]
    fn promotion_marker_written_when_absent() {
        let mut content = RepoContent::default();
        content.base_repo = Some(BaseRepoSpec {
            commit: "abc123".into(),
            ..Default::default()
        });

        let plan = plan_tree(&[], None, &content);
        assert!(plan.is_promoted);
        let marker = plan
            .entries
            .iter()
            .find(|e| e.path == PROMOTED_COMMIT_ID_PATH)
            .unwrap();
        assert_eq!(marker.content.as_deref(), Some("abc123"));
    }

    #[test]
    fn promotion_marker_skipped_when_unchanged() {
        let mut content = RepoContent::default();
        content.base_repo = Some(BaseRepoSpec {
            commit: "abc123".into(),
            ..Default::default()
        });

        let plan = plan_tree(&[], Some("abc123"), &content);
        assert!(!plan.is_promoted);
        assert!(plan
            .entries
            .iter()
            .all(|e| e.path != PROMOTED_COMMIT_ID_PATH));
    }

    #[test]
    fn promotion_marker_rewritten_on_change() {
        let mut content = RepoContent::default();
        content.base_repo = Some(BaseRepoSpec {
            commit: "def456".into(),
            ..Default::default()
        });

        let plan = plan_tree(&[], Some("abc123"), &content);
        assert!(plan.is_promoted);
    }

    #[test]
    fn empty_commit_writes_no_marker() {
        let mut content = RepoContent::default();
        content.base_repo = Some(BaseRepoSpec::default());
        let plan = plan_tree(&[], None, &content);
        assert!(!plan.is_promoted);
        assert!(plan.entries.is_empty());
    }

    #[test]
    fn apply_plan_mirrors_writes_and_deletes() {
        let mut files = BTreeMap::new();
        files.insert("drone/app2-test/reconciler.yaml".to_string(), "old".to_string());

        let existing = vec![TreeEntry::blob("drone/app2-test/reconciler.yaml", "s1")];
        let content = content_with("drone", "app1-test", package(&[], ContentType::Yaml));
        let plan = plan_tree(&existing, None, &content);
        apply_plan(&mut files, &plan);

        assert!(!files.contains_key("drone/app2-test/reconciler.yaml"));
        assert!(files.contains_key("drone/app1-test/reconciler.yaml"));
        assert!(files.contains_key("drone/README.md"));
    }
}
