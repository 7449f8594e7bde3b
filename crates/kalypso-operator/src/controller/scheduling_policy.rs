//! SchedulingPolicy reconciler
//!
//! Runs the scheduler over every cluster type and deployment target in the
//! namespace, then converges the owned Assignment set: stale assignments
//! are deleted, missing ones created. Two assignments are the same object
//! iff their specs are equal; names are spec-derived so they coincide.

use std::sync::Arc;

use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use tracing::info;

use kalypso_common::conditions::{reason, set_condition, ConditionStatus};
use kalypso_common::crd::{
    Assignment, ClusterType, DeploymentTarget, SchedulingPolicy, SCHEDULING_POLICY_LABEL,
};
use kalypso_common::{Error, Result};
use kalypso_scheduler::Scheduler;

use super::{patch_conditions, ready, update_failed};
use crate::context::Context;

/// Diff the desired assignment set against the currently owned one.
///
/// Returns (to_create, to_delete-names). Comparison is by spec equality.
pub fn plan_assignments(
    desired: &[Assignment],
    existing: &[Assignment],
) -> (Vec<Assignment>, Vec<String>) {
    let to_create: Vec<Assignment> = desired
        .iter()
        .filter(|wanted| !existing.iter().any(|have| have.spec == wanted.spec))
        .cloned()
        .collect();

    let to_delete: Vec<String> = existing
        .iter()
        .filter(|have| !desired.iter().any(|wanted| wanted.spec == have.spec))
        .map(|have| have.name_any())
        .collect();

    (to_create, to_delete)
}

/// Reconcile a SchedulingPolicy.
pub async fn reconcile(policy: Arc<SchedulingPolicy>, ctx: Arc<Context>) -> Result<Action, Error> {
    if policy.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let namespace = policy
        .namespace()
        .ok_or_else(|| Error::internal("scheduling policy without namespace"))?;
    info!(policy = %policy.name_any(), %namespace, "reconciling scheduling policy");

    let api: Api<SchedulingPolicy> = Api::namespaced(ctx.client.clone(), &namespace);
    let mut conditions = policy
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    set_condition(
        &mut conditions,
        ready(ConditionStatus::False, reason::RESCHEDULING),
    );
    patch_conditions(&api, &policy.name_any(), &conditions).await?;

    match converge_assignments(&policy, &namespace, &ctx).await {
        Ok(count) => {
            info!(policy = %policy.name_any(), assignments = count, "assignments converged");
            set_condition(
                &mut conditions,
                ready(ConditionStatus::True, reason::ASSIGNMENTS_CREATED),
            );
            patch_conditions(&api, &policy.name_any(), &conditions).await?;
            Ok(Action::await_change())
        }
        Err(err) => {
            tracing::error!(policy = %policy.name_any(), error = %err, "scheduling failed");
            set_condition(&mut conditions, update_failed(&err));
            patch_conditions(&api, &policy.name_any(), &conditions).await?;
            Err(err)
        }
    }
}

async fn converge_assignments(
    policy: &SchedulingPolicy,
    namespace: &str,
    ctx: &Context,
) -> Result<usize> {
    let cluster_types: Api<ClusterType> = Api::namespaced(ctx.client.clone(), namespace);
    let deployment_targets: Api<DeploymentTarget> = Api::namespaced(ctx.client.clone(), namespace);
    let assignments: Api<Assignment> = Api::namespaced(ctx.client.clone(), namespace);

    let all_cluster_types = cluster_types.list(&ListParams::default()).await?.items;
    let all_targets = deployment_targets.list(&ListParams::default()).await?.items;

    let scheduler = Scheduler::new(policy)?;
    let desired = scheduler.schedule(&all_cluster_types, &all_targets);

    let selector = format!("{SCHEDULING_POLICY_LABEL}={}", policy.name_any());
    let existing = assignments
        .list(&ListParams::default().labels(&selector))
        .await?
        .items;

    let (to_create, to_delete) = plan_assignments(&desired, &existing);

    for name in &to_delete {
        assignments.delete(name, &DeleteParams::default()).await?;
        info!(assignment = %name, "deleted assignment");
    }

    for mut assignment in to_create {
        assignment.metadata.namespace = Some(namespace.to_string());
        assignment.metadata.owner_references =
            policy.controller_owner_ref(&()).map(|reference| vec![reference]);

        match assignments.create(&PostParams::default(), &assignment).await {
            Ok(_) => info!(assignment = %assignment.name_any(), "created assignment"),
            // overlapping policies compute identical assignments; the
            // object already existing means another policy won the race
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                info!(assignment = %assignment.name_any(), "assignment already exists")
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(desired.len())
}

/// Error policy: requeue transients, wait out declarative failures.
pub fn error_policy(policy: Arc<SchedulingPolicy>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(policy = %policy.name_any(), %error, "scheduling policy reconciliation error");
    super::error_policy_for(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    use kalypso_common::crd::AssignmentSpec;

    fn assignment(workload: &str, target: &str, cluster_type: &str) -> Assignment {
        let spec = AssignmentSpec {
            workload: workload.into(),
            deployment_target: target.into(),
            cluster_type: cluster_type.into(),
        };
        Assignment::new(&spec.compose_name(), spec)
    }

    #[test]
    fn first_schedule_creates_everything() {
        let desired = vec![assignment("app1", "app1-test", "drone")];
        let (to_create, to_delete) = plan_assignments(&desired, &[]);
        assert_eq!(to_create.len(), 1);
        assert!(to_delete.is_empty());
    }

    #[test]
    fn unchanged_set_is_a_no_op() {
        let desired = vec![
            assignment("app1", "app1-test", "drone"),
            assignment("app2", "app2-test", "drone"),
        ];
        let (to_create, to_delete) = plan_assignments(&desired, &desired.clone());
        assert!(to_create.is_empty());
        assert!(to_delete.is_empty());
    }

    #[test]
    fn stale_assignments_are_deleted() {
        let desired = vec![assignment("app1", "app1-test", "drone")];
        let existing = vec![
            assignment("app1", "app1-test", "drone"),
            assignment("app1", "app1-test", "retired-ct"),
        ];
        let (to_create, to_delete) = plan_assignments(&desired, &existing);
        assert!(to_create.is_empty());
        assert_eq!(to_delete, vec!["app1-app1-test-retired-ct".to_string()]);
    }

    #[test]
    fn recreated_policy_converges_to_the_same_set() {
        // delete-and-recreate with the same spec: existing assignments all
        // match desired specs, so nothing changes
        let desired = vec![
            assignment("app1", "app1-test", "drone"),
            assignment("app1", "app1-test", "large"),
        ];
        let (to_create, to_delete) = plan_assignments(&desired, &desired.clone());
        assert!(to_create.is_empty() && to_delete.is_empty());
    }

    #[test]
    fn comparison_is_by_spec_not_name() {
        let desired = vec![assignment("app1", "app1-test", "drone")];
        let mut renamed = assignment("app1", "app1-test", "drone");
        renamed.metadata.name = Some("legacy-name".into());
        let (to_create, to_delete) = plan_assignments(&desired, &[renamed]);
        assert!(to_create.is_empty());
        assert!(to_delete.is_empty());
    }
}
