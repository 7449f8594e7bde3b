//! Environment CRD types

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ManifestsSpec;
use crate::conditions::Condition;

/// An environment registration; points the control plane at the repo that
/// defines the environment's scheduling objects
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "Environment",
    plural = "environments",
    namespaced,
    status = "EnvironmentStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    /// Where the environment's control-plane objects live
    pub control_plane: ManifestsSpec,
}

/// Status of an Environment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
