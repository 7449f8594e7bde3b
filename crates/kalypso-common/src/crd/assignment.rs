//! Assignment CRD types
//!
//! A computed (workload, deployment-target, cluster-type) triple. Named
//! `{workload}-{deploymentTarget}-{clusterType}` so equal specs always
//! coincide with equal names.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::GitIssueStatus;
use crate::conditions::Condition;

/// A scheduling decision produced by a SchedulingPolicy
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "Assignment",
    plural = "assignments",
    namespaced,
    status = "AssignmentStatus",
    printcolumn = r#"{"name":"Workload","type":"string","jsonPath":".spec.workload"}"#,
    printcolumn = r#"{"name":"ClusterType","type":"string","jsonPath":".spec.clusterType"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSpec {
    /// Workload the target belongs to
    pub workload: String,

    /// Scheduled deployment target
    pub deployment_target: String,

    /// Cluster type it is scheduled onto
    pub cluster_type: String,
}

/// Status of an Assignment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// GitHub issue mirroring the last failure, if any
    #[serde(default)]
    pub git_issue_status: GitIssueStatus,
}

impl AssignmentSpec {
    /// The canonical object name for this spec.
    pub fn compose_name(&self) -> String {
        format!(
            "{}-{}-{}",
            self.workload, self.deployment_target, self.cluster_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_spec_derived() {
        let spec = AssignmentSpec {
            workload: "app1".into(),
            deployment_target: "functional-test".into(),
            cluster_type: "drone".into(),
        };
        assert_eq!(spec.compose_name(), "app1-functional-test-drone");
    }

    #[test]
    fn equal_specs_compare_equal() {
        let a = AssignmentSpec {
            workload: "w".into(),
            deployment_target: "d".into(),
            cluster_type: "c".into(),
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}
