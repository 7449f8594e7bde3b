//! BaseRepo reconciler
//!
//! Thin translator: one flux reference pair named `{namespace}-{name}`
//! pulling the tracked upstream repo (pinned to its commit) into the
//! environment namespace.

use std::sync::Arc;
use std::time::Duration;

use kube::api::Api;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::info;

use kalypso_common::conditions::{reason, set_condition, ConditionStatus};
use kalypso_common::crd::BaseRepo;
use kalypso_common::{Error, Result};

use super::{
    ensure_flux_finalizer, patch_conditions, ready, remove_flux_finalizer, update_failed,
};
use crate::context::Context;
use crate::flux::{FluxProxy, DEFAULT_FLUX_NAMESPACE};

/// Reconcile a BaseRepo.
pub async fn reconcile(base_repo: Arc<BaseRepo>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = base_repo
        .namespace()
        .ok_or_else(|| Error::internal("base repo without namespace"))?;
    let name = base_repo.name_any();
    let flux_name = format!("{namespace}-{name}");
    let api: Api<BaseRepo> = Api::namespaced(ctx.client.clone(), &namespace);
    let flux = FluxProxy::new(ctx.client.clone());

    if base_repo.metadata.deletion_timestamp.is_some() {
        flux.delete_flux_reference_resources(&flux_name, DEFAULT_FLUX_NAMESPACE)
            .await?;
        remove_flux_finalizer(&api, base_repo.as_ref()).await?;
        info!(base_repo = %name, "flux resources deleted");
        return Ok(Action::await_change());
    }

    if ensure_flux_finalizer(&api, base_repo.as_ref()).await? {
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let result = flux
        .create_flux_reference_resources(
            &flux_name,
            DEFAULT_FLUX_NAMESPACE,
            &namespace,
            &base_repo.spec.manifests.repo,
            &base_repo.spec.manifests.branch,
            &base_repo.spec.manifests.path,
            &base_repo.spec.commit,
        )
        .await;

    let mut conditions = base_repo
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    match result {
        Ok(()) => {
            set_condition(
                &mut conditions,
                ready(ConditionStatus::True, reason::FLUX_RESOURCES_CREATED),
            );
            patch_conditions(&api, &name, &conditions).await?;
            Ok(Action::await_change())
        }
        Err(err) => {
            tracing::error!(base_repo = %name, error = %err, "base repo reconciliation failed");
            set_condition(&mut conditions, update_failed(&err));
            patch_conditions(&api, &name, &conditions).await?;
            Err(err)
        }
    }
}

/// Error policy: requeue transients, wait out declarative failures.
pub fn error_policy(base_repo: Arc<BaseRepo>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(base_repo = %base_repo.name_any(), %error, "base repo reconciliation error");
    super::error_policy_for(error)
}
