//! Flux proxy
//!
//! Creates, updates and deletes `{GitRepository, Kustomization}` pairs so
//! the external sync controller pulls a given URL/branch/path into a target
//! namespace. The pair shares one name; the kustomization points at the git
//! repository of the same name.

use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams};
use kube::discovery::ApiResource;
use kube::Client;
use serde_json::{json, Value};

use kalypso_common::Result;

use crate::controller::FIELD_MANAGER;

/// Namespace the flux resources live in.
pub const DEFAULT_FLUX_NAMESPACE: &str = "flux-system";
/// Poll interval for both resources.
pub const FLUX_INTERVAL: &str = "10s";
/// Secret holding git credentials for the sync controller.
pub const GIT_AUTH_SECRET: &str = "cluster-config-dev-auth";

fn git_repository_resource() -> ApiResource {
    ApiResource {
        group: "source.toolkit.fluxcd.io".to_string(),
        version: "v1beta2".to_string(),
        kind: "GitRepository".to_string(),
        api_version: "source.toolkit.fluxcd.io/v1beta2".to_string(),
        plural: "gitrepositories".to_string(),
    }
}

fn kustomization_resource() -> ApiResource {
    ApiResource {
        group: "kustomize.toolkit.fluxcd.io".to_string(),
        version: "v1beta2".to_string(),
        kind: "Kustomization".to_string(),
        api_version: "kustomize.toolkit.fluxcd.io/v1beta2".to_string(),
        plural: "kustomizations".to_string(),
    }
}

/// The GitRepository manifest for one reference pair.
pub fn git_repository_manifest(
    name: &str,
    namespace: &str,
    url: &str,
    branch: &str,
    commit: &str,
) -> Value {
    let mut reference = json!({ "branch": branch });
    if !commit.is_empty() {
        reference["commit"] = json!(commit);
    }

    json!({
        "apiVersion": "source.toolkit.fluxcd.io/v1beta2",
        "kind": "GitRepository",
        "metadata": { "name": name, "namespace": namespace },
        "spec": {
            "url": url,
            "interval": FLUX_INTERVAL,
            "ref": reference,
            "secretRef": { "name": GIT_AUTH_SECRET },
        }
    })
}

/// The Kustomization manifest for one reference pair.
pub fn kustomization_manifest(
    name: &str,
    namespace: &str,
    target_namespace: &str,
    path: &str,
) -> Value {
    json!({
        "apiVersion": "kustomize.toolkit.fluxcd.io/v1beta2",
        "kind": "Kustomization",
        "metadata": { "name": name, "namespace": namespace },
        "spec": {
            "interval": FLUX_INTERVAL,
            "path": path,
            "prune": true,
            "sourceRef": { "kind": "GitRepository", "name": name },
            "targetNamespace": target_namespace,
        }
    })
}

/// Creates and deletes flux reference pairs on the cluster.
pub struct FluxProxy {
    client: Client,
}

impl FluxProxy {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create or update the pair pulling `url`/`branch`/`path` into
    /// `target_namespace`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_flux_reference_resources(
        &self,
        name: &str,
        namespace: &str,
        target_namespace: &str,
        url: &str,
        branch: &str,
        path: &str,
        commit: &str,
    ) -> Result<()> {
        let params = PatchParams::apply(FIELD_MANAGER).force();

        let repositories: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &git_repository_resource());
        repositories
            .patch(
                name,
                &params,
                &Patch::Apply(&git_repository_manifest(name, namespace, url, branch, commit)),
            )
            .await?;

        let kustomizations: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &kustomization_resource());
        kustomizations
            .patch(
                name,
                &params,
                &Patch::Apply(&kustomization_manifest(
                    name,
                    namespace,
                    target_namespace,
                    path,
                )),
            )
            .await?;

        tracing::info!(%name, %namespace, %target_namespace, "flux reference resources applied");
        Ok(())
    }

    /// Delete both resources of a pair; absent resources are fine.
    pub async fn delete_flux_reference_resources(&self, name: &str, namespace: &str) -> Result<()> {
        let repositories: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &git_repository_resource());
        match repositories.delete(name, &DeleteParams::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(ae)) if ae.code == 404 => {}
            Err(err) => return Err(err.into()),
        }

        let kustomizations: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &kustomization_resource());
        match kustomizations.delete(name, &DeleteParams::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(ae)) if ae.code == 404 => {}
            Err(err) => return Err(err.into()),
        }

        tracing::info!(%name, %namespace, "flux reference resources deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_repository_manifest_shape() {
        let manifest = git_repository_manifest(
            "dev-control-plane",
            DEFAULT_FLUX_NAMESPACE,
            "https://github.com/org/control-plane",
            "main",
            "",
        );
        assert_eq!(manifest["kind"], "GitRepository");
        assert_eq!(manifest["spec"]["interval"], FLUX_INTERVAL);
        assert_eq!(manifest["spec"]["ref"]["branch"], "main");
        assert!(manifest["spec"]["ref"].get("commit").is_none());
        assert_eq!(manifest["spec"]["secretRef"]["name"], GIT_AUTH_SECRET);
    }

    #[test]
    fn pinned_commit_is_included() {
        let manifest =
            git_repository_manifest("dev-base", "flux-system", "https://x", "main", "abc123");
        assert_eq!(manifest["spec"]["ref"]["commit"], "abc123");
    }

    #[test]
    fn kustomization_points_at_the_sibling_repository() {
        let manifest =
            kustomization_manifest("dev-control-plane", "flux-system", "dev", "environment/dev");
        assert_eq!(manifest["spec"]["sourceRef"]["kind"], "GitRepository");
        assert_eq!(manifest["spec"]["sourceRef"]["name"], "dev-control-plane");
        assert_eq!(manifest["spec"]["targetNamespace"], "dev");
        assert_eq!(manifest["spec"]["prune"], true);
    }
}
