//! AssignmentPackage CRD types
//!
//! The compiled artefact for one Assignment: rendered reconciler, namespace
//! and platform-config manifests. Content deterministically depends on the
//! inputs; two identical inputs yield byte-identical packages.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ContentType;
use crate::conditions::Condition;

/// Compiled manifests for one assignment
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "AssignmentPackage",
    plural = "assignmentpackages",
    namespaced,
    status = "AssignmentPackageStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPackageSpec {
    /// Rendered reconciler manifests, one document per entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reconciler_manifests: Vec<String>,

    /// Rendered namespace manifests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespace_manifests: Vec<String>,

    /// Rendered platform-config manifests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_manifests: Vec<String>,

    /// Content type of `config_manifests`; decides the downstream file
    /// extension
    #[serde(default)]
    pub config_manifests_content_type: ContentType,
}

/// Status of an AssignmentPackage
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPackageStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_spec_round_trips() {
        let spec = AssignmentPackageSpec {
            reconciler_manifests: vec!["kind: GitRepository".into()],
            namespace_manifests: vec!["kind: Namespace".into()],
            config_manifests: vec!["foo: bar\n".into()],
            config_manifests_content_type: ContentType::Yaml,
        };
        let encoded = serde_json::to_value(&spec).unwrap();
        assert_eq!(encoded["configManifestsContentType"], "yaml");
        let decoded: AssignmentPackageSpec = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, spec);
    }
}
