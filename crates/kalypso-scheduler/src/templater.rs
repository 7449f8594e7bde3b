//! Per-assignment templating
//!
//! Builds the data bundle one assignment exposes to manifest templates and
//! drives the shared engine over a Template's manifest strings.

use std::collections::BTreeMap;

use kube::ResourceExt;
use serde::Serialize;
use serde_json::Value;

use kalypso_common::crd::{ClusterType, DeploymentTarget, ManifestsSpec, Template};
use kalypso_common::template::TemplateEngine;
use kalypso_common::Result;

use crate::config::ConfigData;

/// The values manifest templates can reference.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TemplateData {
    deployment_target_name: String,
    namespace: String,
    environment: String,
    workspace: String,
    workload: String,
    cluster_type: String,
    labels: BTreeMap<String, String>,
    manifests: ManifestsSpec,
    config_data: BTreeMap<String, Value>,
}

/// Expands templates against one (deployment-target, cluster-type) pair.
pub struct Templater {
    namespace: String,
    data: minijinja::Value,
    engine: TemplateEngine,
}

impl Templater {
    /// Build the data bundle for an assignment.
    ///
    /// The target namespace is
    /// `{environment}-{clusterType}-{deploymentTarget}`.
    pub fn new(
        target: &DeploymentTarget,
        cluster_type: &ClusterType,
        config_data: ConfigData,
    ) -> Self {
        let namespace = format!(
            "{}-{}-{}",
            target.spec.environment,
            cluster_type.name_any(),
            target.name_any()
        );

        let data = TemplateData {
            deployment_target_name: target.name_any(),
            namespace: namespace.clone(),
            environment: target.spec.environment.clone(),
            workspace: target.workspace(),
            workload: target.workload(),
            cluster_type: cluster_type.name_any(),
            labels: target.labels().clone(),
            manifests: target.spec.manifests.clone(),
            config_data,
        };

        Self {
            namespace,
            data: minijinja::Value::from_serialize(&data),
            engine: TemplateEngine::new(),
        }
    }

    /// Expand every manifest of a template; empty renders are dropped.
    pub fn process(&self, template: &Template) -> Result<Vec<String>> {
        let mut processed = Vec::with_capacity(template.spec.manifests.len());
        for manifest in &template.spec.manifests {
            let rendered = self.engine.render_nested(manifest, &self.data)?;
            if !rendered.trim().is_empty() {
                processed.push(rendered);
            }
        }
        Ok(processed)
    }

    /// The namespace the assignment deploys into.
    pub fn target_namespace(&self) -> &str {
        &self.namespace
    }
}
