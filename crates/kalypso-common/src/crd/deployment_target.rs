//! DeploymentTarget CRD types
//!
//! A deployable slice of a workload in one environment. Owned by its
//! Workload; the `workload` and `workspace` labels are required and feed
//! scheduling, config selection and templating.

use kube::CustomResource;
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ManifestsSpec;
use super::{WORKLOAD_LABEL, WORKSPACE_LABEL};
use crate::conditions::Condition;

/// A workload × environment-slice deployable
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "DeploymentTarget",
    plural = "deploymenttargets",
    namespaced,
    status = "DeploymentTargetStatus",
    printcolumn = r#"{"name":"Environment","type":"string","jsonPath":".spec.environment"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTargetSpec {
    /// Environment this target deploys into (e.g. `dev`)
    pub environment: String,

    /// Where the workload's own manifests live
    pub manifests: ManifestsSpec,

    /// Inline JSON Schema documents the platform config must satisfy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_schemas: Vec<String>,
}

/// Status of a DeploymentTarget
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTargetStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl DeploymentTarget {
    /// Owning workload, from the required `workload` label.
    pub fn workload(&self) -> String {
        self.labels().get(WORKLOAD_LABEL).cloned().unwrap_or_default()
    }

    /// Workspace (tenancy grouping), from the required `workspace` label.
    pub fn workspace(&self) -> String {
        self.labels().get(WORKSPACE_LABEL).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_back_the_accessors() {
        let mut target = DeploymentTarget::new(
            "app1-functional-test",
            DeploymentTargetSpec {
                environment: "dev".into(),
                ..Default::default()
            },
        );
        target.metadata.labels = Some(
            [(WORKLOAD_LABEL.to_string(), "app1".to_string()),
             (WORKSPACE_LABEL.to_string(), "team-a".to_string())]
            .into(),
        );
        assert_eq!(target.workload(), "app1");
        assert_eq!(target.workspace(), "team-a");
    }

    #[test]
    fn missing_labels_yield_empty_strings() {
        let target = DeploymentTarget::new("orphan", DeploymentTargetSpec::default());
        assert_eq!(target.workload(), "");
        assert_eq!(target.workspace(), "");
    }
}
