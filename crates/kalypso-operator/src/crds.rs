//! CRD installation
//!
//! The operator installs its own CRDs on startup using server-side apply,
//! so the stored versions always match the operator build.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use kalypso_common::crd::{
    Assignment, AssignmentPackage, BaseRepo, ClusterType, ConfigSchema, DeploymentTarget,
    Environment, GitOpsRepo, SchedulingPolicy, Template, Workload, WorkloadRegistration, GROUP,
};
use kalypso_common::Result;

use crate::controller::FIELD_MANAGER;

/// CRD definition with its cluster-wide name
struct CrdDef {
    name: String,
    crd: CustomResourceDefinition,
}

fn def(plural: &str, crd: CustomResourceDefinition) -> CrdDef {
    CrdDef {
        name: format!("{plural}.{GROUP}"),
        crd,
    }
}

/// Every Kalypso CRD.
fn all_crds() -> Vec<CrdDef> {
    vec![
        def("workloads", Workload::crd()),
        def("deploymenttargets", DeploymentTarget::crd()),
        def("clustertypes", ClusterType::crd()),
        def("templates", Template::crd()),
        def("configschemas", ConfigSchema::crd()),
        def("schedulingpolicies", SchedulingPolicy::crd()),
        def("assignments", Assignment::crd()),
        def("assignmentpackages", AssignmentPackage::crd()),
        def("gitopsrepoes", GitOpsRepo::crd()),
        def("baserepoes", BaseRepo::crd()),
        def("environments", Environment::crd()),
        def("workloadregistrations", WorkloadRegistration::crd()),
    ]
}

/// Install or update every Kalypso CRD.
pub async fn ensure_crds_installed(client: &Client) -> Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for definition in all_crds() {
        tracing::info!(crd = %definition.name, "installing CRD");
        crds.patch(&definition.name, &params, &Patch::Apply(&definition.crd))
            .await?;
    }

    tracing::info!("all Kalypso CRDs installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_is_registered() {
        let names: Vec<String> = all_crds().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names.len(), 12);
        assert!(names.contains(&"workloads.scheduler.kalypso.io".to_string()));
        assert!(names.contains(&"gitopsrepoes.scheduler.kalypso.io".to_string()));
    }

    #[test]
    fn crd_names_match_their_definitions() {
        for definition in all_crds() {
            assert_eq!(
                definition.crd.metadata.name.as_deref(),
                Some(definition.name.as_str()),
                "plural/group mismatch for {}",
                definition.name
            );
        }
    }

    #[test]
    fn crds_are_namespaced() {
        for definition in all_crds() {
            assert_eq!(definition.crd.spec.scope, "Namespaced");
        }
    }

    #[test]
    fn conditions_appear_in_status_schemas() {
        let crd = Assignment::crd();
        let version = &crd.spec.versions[0];
        let schema = serde_json::to_value(version.schema.as_ref().unwrap()).unwrap();
        let status = &schema["openAPIV3Schema"]["properties"]["status"];
        assert!(status["properties"].get("conditions").is_some());
        assert!(status["properties"].get("gitIssueStatus").is_some());
    }
}
