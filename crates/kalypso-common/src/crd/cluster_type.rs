//! ClusterType CRD types

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conditions::Condition;

/// A class of clusters sharing reconciler, namespace and config templates.
/// Arbitrary user labels on the object are what scheduling policies and
/// platform ConfigMaps select on.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "ClusterType",
    plural = "clustertypes",
    namespaced,
    status = "ClusterTypeStatus",
    printcolumn = r#"{"name":"Reconciler","type":"string","jsonPath":".spec.reconciler"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTypeSpec {
    /// Name of the Template producing reconciler manifests
    pub reconciler: String,

    /// Name of the Template producing namespace manifests
    pub namespace_service: String,

    /// Name of the Template producing platform-config manifests; absent
    /// means the cluster type ships no config artefact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_type: Option<String>,
}

/// Status of a ClusterType
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTypeStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_type_is_optional() {
        let spec: ClusterTypeSpec = serde_json::from_value(serde_json::json!({
            "reconciler": "arc-flux",
            "namespaceService": "default-namespace"
        }))
        .unwrap();
        assert_eq!(spec.reconciler, "arc-flux");
        assert!(spec.config_type.is_none());

        let encoded = serde_json::to_value(&spec).unwrap();
        assert!(encoded.get("configType").is_none());
    }
}
