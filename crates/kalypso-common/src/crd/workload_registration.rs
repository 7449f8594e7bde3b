//! WorkloadRegistration CRD types

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ManifestsSpec;
use crate::conditions::Condition;

/// Registers a workload repository for pulling onto the control plane; the
/// `workspace` it names is inherited by every deployment target of the
/// workloads it registers
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "WorkloadRegistration",
    plural = "workloadregistrations",
    namespaced,
    status = "WorkloadRegistrationStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRegistrationSpec {
    /// Where the workload registration objects live
    pub workload: ManifestsSpec,

    /// Workspace (tenancy grouping) of the registered workloads
    #[serde(default)]
    pub workspace: String,
}

/// Status of a WorkloadRegistration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRegistrationStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
