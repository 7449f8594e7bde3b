//! SchedulingPolicy CRD types

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conditions::Condition;
use crate::labels::LabelSelector;

/// Selector over deployment targets, optionally gated by workspace.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTargetSelectorSpec {
    /// When non-empty, only targets whose `workspace` label equals this
    /// value are eligible
    #[serde(default)]
    pub workspace: String,

    /// Label selector over deployment-target labels
    #[serde(default)]
    pub label_selector: LabelSelector,
}

/// Selector over cluster types.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTypeSelectorSpec {
    /// Label selector over cluster-type labels
    #[serde(default)]
    pub label_selector: LabelSelector,
}

/// A pair of label selectors over deployment targets and cluster types;
/// owns the Assignments its selection produces
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "SchedulingPolicy",
    plural = "schedulingpolicies",
    namespaced,
    status = "SchedulingPolicyStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingPolicySpec {
    /// Which deployment targets the policy schedules
    #[serde(default)]
    pub deployment_target_selector: DeploymentTargetSelectorSpec,

    /// Which cluster types the policy schedules onto
    #[serde(default)]
    pub cluster_type_selector: ClusterTypeSelectorSpec,
}

/// Status of a SchedulingPolicy
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingPolicyStatus {
    /// `Ready` reason `AssignmentsCreated` once the assignment set matches
    /// the selection
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
