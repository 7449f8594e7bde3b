//! Template CRD types

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ContentType;

/// A named collection of manifest template strings
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "scheduler.kalypso.io",
    version = "v1alpha1",
    kind = "Template",
    plural = "templates",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    /// Template strings, expanded in order
    #[serde(default)]
    pub manifests: Vec<String>,

    /// Content type of the rendered manifests
    #[serde(default)]
    pub content_type: ContentType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_defaults_to_yaml() {
        let spec: TemplateSpec = serde_json::from_value(serde_json::json!({
            "manifests": ["kind: Namespace\nmetadata:\n  name: {{ Namespace }}"]
        }))
        .unwrap();
        assert_eq!(spec.content_type, ContentType::Yaml);
        assert_eq!(spec.manifests.len(), 1);
    }

    #[test]
    fn env_content_type_parses() {
        let spec: TemplateSpec = serde_json::from_value(serde_json::json!({
            "manifests": ["export FOO={{ ConfigData.foo }}"],
            "contentType": "env"
        }))
        .unwrap();
        assert_eq!(spec.content_type, ContentType::Env);
    }
}
