//! WorkloadRegistration reconciler
//!
//! Thin translator: one flux reference pair named `{namespace}-{name}`
//! pulling the registered workload repo into the environment namespace.
//! The workload reconciler later reads the registration back to derive the
//! `workspace` label.

use std::sync::Arc;
use std::time::Duration;

use kube::api::Api;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::info;

use kalypso_common::conditions::{reason, set_condition, ConditionStatus};
use kalypso_common::crd::WorkloadRegistration;
use kalypso_common::{Error, Result};

use super::{
    ensure_flux_finalizer, patch_conditions, ready, remove_flux_finalizer, update_failed,
};
use crate::context::Context;
use crate::flux::{FluxProxy, DEFAULT_FLUX_NAMESPACE};

/// Reconcile a WorkloadRegistration.
pub async fn reconcile(
    registration: Arc<WorkloadRegistration>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let namespace = registration
        .namespace()
        .ok_or_else(|| Error::internal("workload registration without namespace"))?;
    let name = registration.name_any();
    let flux_name = format!("{namespace}-{name}");
    let api: Api<WorkloadRegistration> = Api::namespaced(ctx.client.clone(), &namespace);
    let flux = FluxProxy::new(ctx.client.clone());

    if registration.metadata.deletion_timestamp.is_some() {
        flux.delete_flux_reference_resources(&flux_name, DEFAULT_FLUX_NAMESPACE)
            .await?;
        remove_flux_finalizer(&api, registration.as_ref()).await?;
        info!(registration = %name, "flux resources deleted");
        return Ok(Action::await_change());
    }

    if ensure_flux_finalizer(&api, registration.as_ref()).await? {
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let result = flux
        .create_flux_reference_resources(
            &flux_name,
            DEFAULT_FLUX_NAMESPACE,
            &namespace,
            &registration.spec.workload.repo,
            &registration.spec.workload.branch,
            &registration.spec.workload.path,
            "",
        )
        .await;

    let mut conditions = registration
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
            tracing::error!(registration = %name, error = %err, "workload registration reconciliation failed");
            set_condition(&mut conditions, update_failed(&err));
            patch_conditions(&api, &name, &conditions).await?;
            Err(err)
        }
    }
}

/// Error policy: requeue transients, wait out declarative failures.
pub fn error_policy(
    registration: Arc<WorkloadRegistration>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    tracing::error!(registration = %registration.name_any(), %error, "workload registration reconciliation error");
    super::error_policy_for(error)
}
