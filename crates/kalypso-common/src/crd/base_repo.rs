//! BaseRepo CRD types

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ManifestsSpec;
use crate::conditions::Condition;

/// The tracked upstream repository; its `commit` is propagated into the
/// downstream PR as the `.github/tracking/Promoted_Commit_Id` marker
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "BaseRepo",
    plural = "baserepoes",
    namespaced,
    status = "BaseRepoStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct BaseRepoSpec {
    /// Repository, branch and path pulled onto the control plane
    #[serde(flatten)]
    pub manifests: ManifestsSpec,

    /// Pinned commit propagated downstream as the promotion marker
    #[serde(default)]
    pub commit: String,
}

/// Status of a BaseRepo
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaseRepoStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
