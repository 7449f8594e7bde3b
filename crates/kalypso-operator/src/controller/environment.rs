//! Environment reconciler
//!
//! Thin translator: an Environment becomes a namespace of the same name
//! plus one flux reference pair pulling the environment's control-plane
//! repo into it.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, PostParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::info;

use kalypso_common::conditions::{reason, set_condition, ConditionStatus};
use kalypso_common::crd::Environment;
use kalypso_common::{Error, Result};

use super::{
    ensure_flux_finalizer, patch_conditions, ready, remove_flux_finalizer, update_failed,
};
use crate::context::Context;
use crate::flux::{FluxProxy, DEFAULT_FLUX_NAMESPACE};

/// Reconcile an Environment.
pub async fn reconcile(environment: Arc<Environment>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = environment
        .namespace()
        .ok_or_else(|| Error::internal("environment without namespace"))?;
    let name = environment.name_any();
    let api: Api<Environment> = Api::namespaced(ctx.client.clone(), &namespace);
    let flux = FluxProxy::new(ctx.client.clone());

    if environment.metadata.deletion_timestamp.is_some() {
        flux.delete_flux_reference_resources(&name, DEFAULT_FLUX_NAMESPACE)
            .await?;
        remove_flux_finalizer(&api, environment.as_ref()).await?;
        info!(environment = %name, "flux resources deleted");
        return Ok(Action::await_change());
    }

    if ensure_flux_finalizer(&api, environment.as_ref()).await? {
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    match apply(&environment, &name, &ctx, &flux).await {
        Ok(()) => {
            let mut conditions = environment
                .status
                .as_ref()
                .map(|s| s.conditions.clone())
                .unwrap_or_default();
            set_condition(
                &mut conditions,
                ready(ConditionStatus::True, reason::FLUX_RESOURCES_CREATED),
            );
            patch_conditions(&api, &name, &conditions).await?;
            Ok(Action::await_change())
        }
        Err(err) => {
            tracing::error!(environment = %name, error = %err, "environment reconciliation failed");
            let mut conditions = environment
                .status
                .as_ref()
                .map(|s| s.conditions.clone())
                .unwrap_or_default();
            set_condition(&mut conditions, update_failed(&err));
            patch_conditions(&api, &name, &conditions).await?;
            Err(err)
        }
    }
}

async fn apply(
    environment: &Environment,
    name: &str,
    ctx: &Context,
    flux: &FluxProxy,
) -> Result<()> {
    ensure_namespace(&ctx.client, name).await?;

    flux.create_flux_reference_resources(
        name,
        DEFAULT_FLUX_NAMESPACE,
        name,
        &environment.spec.control_plane.repo,
        &environment.spec.control_plane.branch,
        &environment.spec.control_plane.path,
        "",
    )
    .await
}

/// Create the environment namespace if it is missing.
async fn ensure_namespace(client: &kube::Client, name: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let namespace = Namespace {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &namespace).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Error policy: requeue transients, wait out declarative failures.
pub fn error_policy(environment: Arc<Environment>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(environment = %environment.name_any(), %error, "environment reconciliation error");
    super::error_policy_for(error)
}
