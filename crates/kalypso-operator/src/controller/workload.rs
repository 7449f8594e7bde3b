//! Workload reconciler
//!
//! Projects a Workload spec onto the set of its child DeploymentTargets:
//! entries removed from the spec are deleted, the rest are applied with
//! composed names, merged labels and an owner reference back to the
//! workload. The `workspace` label is derived from the WorkloadRegistration
//! the flux owner label points at.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tracing::info;

use kalypso_common::conditions::{reason, set_condition, ConditionStatus};
use kalypso_common::crd::{
    DeploymentTarget, Workload, WorkloadRegistration, FLUX_OWNER_LABEL, WORKLOAD_LABEL,
    WORKSPACE_LABEL,
};
use kalypso_common::{Error, Result};

use super::{patch_conditions, ready, update_failed, FIELD_MANAGER};
use crate::context::Context;

/// The create/update/delete split for one reconcile pass.
#[derive(Debug, Default)]
pub struct DeploymentTargetPlan {
    /// Fully-built objects to server-side apply
    pub upserts: Vec<DeploymentTarget>,
    /// Names of stale children to delete
    pub deletions: Vec<String>,
}

/// Compute the desired child set for a workload.
///
/// Labels compose as: entry labels, overridden by workload labels,
/// overridden by the scheduler-owned `workload` and `workspace` pair.
pub fn plan_deployment_targets(
    workload: &Workload,
    workspace: &str,
    existing: &[DeploymentTarget],
) -> DeploymentTargetPlan {
    let mut plan = DeploymentTargetPlan::default();

    let desired_names: Vec<String> = workload
        .spec
        .deployment_targets
        .iter()
        .map(|entry| workload.deployment_target_name(&entry.name))
        .collect();

    for target in existing {
        if !desired_names.contains(&target.name_any()) {
            plan.deletions.push(target.name_any());
        }
    }

    for entry in &workload.spec.deployment_targets {
        let mut labels: BTreeMap<String, String> = entry.labels.clone();
        for (key, value) in workload.labels() {
            labels.insert(key.clone(), value.clone());
        }
        labels.insert(WORKLOAD_LABEL.to_string(), workload.name_any());
        labels.insert(WORKSPACE_LABEL.to_string(), workspace.to_string());

        let mut target = DeploymentTarget::new(
            &workload.deployment_target_name(&entry.name),
            entry.deployment_target_spec.clone(),
        );
        target.metadata.namespace = workload.namespace();
        target.metadata.labels = Some(labels);
        target.metadata.owner_references =
            workload.controller_owner_ref(&()).map(|reference| vec![reference]);

        plan.upserts.push(target);
    }

    plan
}

/// The workspace a workload belongs to.
///
/// The flux sync controller stamps workloads with
/// `kustomize.toolkit.fluxcd.io/name = {namespace}-{registration}`; the part
/// after the first `-` names the WorkloadRegistration whose spec carries the
/// workspace. Workloads without the label get an empty workspace.
pub async fn workspace_for(client: &Client, workload: &Workload) -> Result<String> {
    let Some(flux_name) = workload.labels().get(FLUX_OWNER_LABEL) else {
        return Ok(String::new());
    };
    let Some((_, registration_name)) = flux_name.split_once('-') else {
        return Ok(String::new());
    };

    let namespace = workload.namespace().unwrap_or_default();
    let api: Api<WorkloadRegistration> = Api::namespaced(client.clone(), &namespace);
    let registration = api.get(registration_name).await?;
    Ok(registration.spec.workspace)
}

/// Reconcile a Workload.
pub async fn reconcile(workload: Arc<Workload>, ctx: Arc<Context>) -> Result<Action, Error> {
    if workload.metadata.deletion_timestamp.is_some() {
        // children are garbage-collected through their owner references
        return Ok(Action::await_change());
    }

    let namespace = workload
        .namespace()
        .ok_or_else(|| Error::internal("workload without namespace"))?;
    info!(workload = %workload.name_any(), %namespace, "reconciling workload");

    match apply_targets(&workload, &namespace, &ctx).await {
        Ok(()) => {
            let mut conditions = workload
                .status
                .as_ref()
                .map(|s| s.conditions.clone())
                .unwrap_or_default();
            set_condition(
                &mut conditions,
                ready(ConditionStatus::True, reason::DEPLOYMENT_TARGETS_CREATED),
            );
            let api: Api<Workload> = Api::namespaced(ctx.client.clone(), &namespace);
            patch_conditions(&api, &workload.name_any(), &conditions).await?;
            Ok(Action::await_change())
        }
        Err(err) => manage_failure(&workload, &namespace, &ctx, err).await,
    }
}

async fn apply_targets(workload: &Workload, namespace: &str, ctx: &Context) -> Result<()> {
    let api: Api<DeploymentTarget> = Api::namespaced(ctx.client.clone(), namespace);

    let selector = format!("{WORKLOAD_LABEL}={}", workload.name_any());
    let existing = api
        .list(&ListParams::default().labels(&selector))
        .await?
        .items;

    let workspace = workspace_for(&ctx.client, workload).await?;
    let plan = plan_deployment_targets(workload, &workspace, &existing);

    for name in &plan.deletions {
        api.delete(name, &DeleteParams::default()).await?;
        info!(target = %name, "deleted deployment target");
    }

    for target in &plan.upserts {
        api.patch(
            &target.name_any(),
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(target),
        )
        .await?;
        info!(target = %target.name_any(), "applied deployment target");
    }

    Ok(())
}

async fn manage_failure(
    workload: &Workload,
    namespace: &str,
    ctx: &Context,
    err: Error,
) -> Result<Action, Error> {
    tracing::error!(workload = %workload.name_any(), error = %err, "workload reconciliation failed");

    let mut conditions = workload
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    set_condition(&mut conditions, update_failed(&err));

    let api: Api<Workload> = Api::namespaced(ctx.client.clone(), namespace);
    patch_conditions(&api, &workload.name_any(), &conditions).await?;

    Err(err)
}

/// Error policy: requeue transients, wait out declarative failures.
pub fn error_policy(workload: Arc<Workload>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(workload = %workload.name_any(), %error, "workload reconciliation error");
    super::error_policy_for(error)
}
