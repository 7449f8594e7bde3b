//! ConfigSchema CRD types

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A JSON Schema (draft-07) applied to the platform config of the
/// (cluster-type, deployment-target) pairs its labels select
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "ConfigSchema",
    plural = "configschemas",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSchemaSpec {
    /// The schema document, inline JSON
    pub schema: String,
}
