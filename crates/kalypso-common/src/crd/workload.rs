//! Workload CRD types
//!
//! A Workload is a logical application registration. Its spec enumerates
//! deployment targets; the workload reconciler fans those out into owned
//! DeploymentTarget objects.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::deployment_target::DeploymentTargetSpec;
use crate::conditions::Condition;

/// One deployment target entry of a workload.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadDeploymentTarget {
    /// Entry name; the child object is named `{workload}-{name}`
    pub name: String,

    /// Extra labels merged onto the child DeploymentTarget
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Spec copied verbatim onto the child
    pub deployment_target_spec: DeploymentTargetSpec,
}

/// A logical application registration; parent of DeploymentTargets
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "Workload",
    plural = "workloads",
    namespaced,
    status = "WorkloadStatus",
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    /// Deployment targets to project into child objects
    #[serde(default)]
    pub deployment_targets: Vec<WorkloadDeploymentTarget>,
}

/// Status of a Workload
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    /// Standard conditions; `Ready` reason `DeploymentTargetsCreated` on
    /// success
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Workload {
    /// Compose the child DeploymentTarget name for a spec entry.
    pub fn deployment_target_name(&self, entry_name: &str) -> String {
        format!(
            "{}-{}",
            self.metadata.name.as_deref().unwrap_or_default(),
            entry_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_target_name_is_composed() {
        let workload = Workload::new("app1", WorkloadSpec::default());
        assert_eq!(workload.deployment_target_name("functional-test"), "app1-functional-test");
    }

    #[test]
    fn workload_spec_round_trips() {
        let spec: WorkloadSpec = serde_json::from_value(serde_json::json!({
            "deploymentTargets": [{
                "name": "functional-test",
                "labels": {"purpose": "test"},
                "deploymentTargetSpec": {
                    "environment": "dev",
                    "manifests": {"repo": "https://github.com/org/app1", "branch": "main", "path": "deploy"}
                }
            }]
        }))
        .unwrap();
        assert_eq!(spec.deployment_targets.len(), 1);
        assert_eq!(spec.deployment_targets[0].deployment_target_spec.environment, "dev");
        let encoded = serde_json::to_value(&spec).unwrap();
        assert_eq!(encoded["deploymentTargets"][0]["name"], "functional-test");
    }
}
