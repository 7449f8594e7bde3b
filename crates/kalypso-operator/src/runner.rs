//! Controller wiring
//!
//! Starts one controller per custom-resource kind and threads the shared
//! context through. Cross-kind triggering goes through `.owns()` /
//! `.watches()`; the mapper functions carry the predicate logic (for
//! instance, the GitOpsRepo only wakes up when a policy or assignment
//! transitions to Ready), and read reflector stores instead of querying the
//! API server.

use std::fmt::Debug;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::Api;
use kube::runtime::reflector::{reflector, store, ObjectRef, Store};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{watcher, Controller, WatchStreamExt};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;

use kalypso_common::conditions::{is_condition_true, READY_CONDITION};
use kalypso_common::crd::{
    Assignment, AssignmentPackage, BaseRepo, ClusterType, ConfigSchema, DeploymentTarget,
    Environment, GitOpsRepo, SchedulingPolicy, Template, Workload, WorkloadRegistration,
};

use crate::context::Context;
use crate::controller::{
    assignment, base_repo, environment, gitops_repo, scheduling_policy, workload,
    workload_registration,
};

/// Start a cluster-wide reflector for a kind and return its read handle.
fn spawn_store<K>(client: &Client) -> Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
{
    let api: Api<K> = Api::all(client.clone());
    let (reader, writer) = store();
    let stream = reflector(writer, watcher(api, WatcherConfig::default()))
        .default_backoff()
        .touched_objects()
        .for_each(|_| futures::future::ready(()));
    tokio::spawn(stream);
    reader
}

fn same_namespace<A: ResourceExt>(a: &A, namespace: &Option<String>) -> bool {
    a.namespace() == *namespace
}

/// Every scheduling policy in the namespace of the changed object.
fn policies_in_namespace(
    policies: &Store<SchedulingPolicy>,
    namespace: Option<String>,
) -> Vec<ObjectRef<SchedulingPolicy>> {
    policies
        .state()
        .iter()
        .filter(|policy| same_namespace(policy.as_ref(), &namespace))
        .map(|policy| ObjectRef::from_obj(policy.as_ref()))
        .collect()
}

/// Every GitOpsRepo in the namespace of the changed object.
fn repos_in_namespace(
    repos: &Store<GitOpsRepo>,
    namespace: Option<String>,
) -> Vec<ObjectRef<GitOpsRepo>> {
    repos
        .state()
        .iter()
        .filter(|repo| same_namespace(repo.as_ref(), &namespace))
        .map(|repo| ObjectRef::from_obj(repo.as_ref()))
        .collect()
}

/// Every assignment in the namespace of the changed object.
fn assignments_in_namespace(
    assignments: &Store<Assignment>,
    namespace: Option<String>,
) -> Vec<ObjectRef<Assignment>> {
    assignments
        .state()
        .iter()
        .filter(|assignment| same_namespace(assignment.as_ref(), &namespace))
        .map(|assignment| ObjectRef::from_obj(assignment.as_ref()))
        .collect()
}

/// Assignments affected by a template change: those whose cluster type uses
/// the template as reconciler, namespace service or config type.
fn assignments_for_template(
    cluster_types: &Store<ClusterType>,
    assignments: &Store<Assignment>,
    template: &Template,
) -> Vec<ObjectRef<Assignment>> {
    let namespace = template.namespace();
    let template_name = template.name_any();

    let using_cluster_types: Vec<String> = cluster_types
        .state()
        .iter()
        .filter(|ct| same_namespace(ct.as_ref(), &namespace))
        .filter(|ct| {
            ct.spec.reconciler == template_name
                || ct.spec.namespace_service == template_name
                || ct.spec.config_type.as_deref() == Some(template_name.as_str())
        })
        .map(|ct| ct.name_any())
        .collect();

    assignments
        .state()
        .iter()
        .filter(|assignment| same_namespace(assignment.as_ref(), &namespace))
        .filter(|assignment| using_cluster_types.contains(&assignment.spec.cluster_type))
        .map(|assignment| ObjectRef::from_obj(assignment.as_ref()))
        .collect()
}

/// Assignments referencing a changed deployment target.
fn assignments_for_target(
    assignments: &Store<Assignment>,
    target: &DeploymentTarget,
) -> Vec<ObjectRef<Assignment>> {
    let namespace = target.namespace();
    let target_name = target.name_any();

    assignments
        .state()
        .iter()
        .filter(|assignment| same_namespace(assignment.as_ref(), &namespace))
        .filter(|assignment| assignment.spec.deployment_target == target_name)
        .map(|assignment| ObjectRef::from_obj(assignment.as_ref()))
        .collect()
}

fn status_is_ready(conditions: Option<&Vec<kalypso_common::conditions::Condition>>) -> bool {
    conditions
        .map(|conditions| is_condition_true(conditions, READY_CONDITION))
        .unwrap_or(false)
}

/// Run every controller until shutdown.
pub async fn run_controllers(ctx: Arc<Context>) {
    let client = ctx.client.clone();
    let cfg = WatcherConfig::default;

    // reflector stores backing the watch mappers
    let policy_store = spawn_store::<SchedulingPolicy>(&client);
    let assignment_store = spawn_store::<Assignment>(&client);
    let cluster_type_store = spawn_store::<ClusterType>(&client);
    let gitops_store = spawn_store::<GitOpsRepo>(&client);

    tracing::info!("starting Kalypso controllers");

    let workload_controller = Controller::new(Api::<Workload>::all(client.clone()), cfg())
        .owns(Api::<DeploymentTarget>::all(client.clone()), cfg())
        .shutdown_on_signal()
        .run(workload::reconcile, workload::error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok(object) => tracing::debug!(?object, "workload reconciled"),
                Err(error) => tracing::error!(%error, "workload controller error"),
            }
        });

    let policy_controller = {
        let for_cluster_types = policy_store.clone();
        let for_targets = policy_store.clone();
        Controller::new(Api::<SchedulingPolicy>::all(client.clone()), cfg())
            .owns(Api::<Assignment>::all(client.clone()), cfg())
            .watches(Api::<ClusterType>::all(client.clone()), cfg(), move |ct| {
                policies_in_namespace(&for_cluster_types, ct.namespace())
            })
            .watches(
                Api::<DeploymentTarget>::all(client.clone()),
                cfg(),
                move |target| policies_in_namespace(&for_targets, target.namespace()),
            )
            .shutdown_on_signal()
            .run(
                scheduling_policy::reconcile,
                scheduling_policy::error_policy,
                ctx.clone(),
            )
            .for_each(|result| async move {
                match result {
                    Ok(object) => tracing::debug!(?object, "scheduling policy reconciled"),
                    Err(error) => tracing::error!(%error, "scheduling policy controller error"),
                }
            })
    };

    let assignment_controller = {
        let templates_cluster_types = cluster_type_store.clone();
        let templates_assignments = assignment_store.clone();
        let config_map_assignments = assignment_store.clone();
        let schema_assignments = assignment_store.clone();
        let target_assignments = assignment_store.clone();
        Controller::new(Api::<Assignment>::all(client.clone()), cfg())
            .owns(Api::<AssignmentPackage>::all(client.clone()), cfg())
            .watches(Api::<Template>::all(client.clone()), cfg(), move |template| {
                assignments_for_template(
                    &templates_cluster_types,
                    &templates_assignments,
                    &template,
                )
            })
            .watches(Api::<ConfigMap>::all(client.clone()), cfg(), move |cm| {
                assignments_in_namespace(&config_map_assignments, cm.namespace())
            })
            .watches(
                Api::<ConfigSchema>::all(client.clone()),
                cfg(),
                move |schema| assignments_in_namespace(&schema_assignments, schema.namespace()),
            )
            .watches(
                Api::<DeploymentTarget>::all(client.clone()),
                cfg(),
                move |target| assignments_for_target(&target_assignments, &target),
            )
            .shutdown_on_signal()
            .run(assignment::reconcile, assignment::error_policy, ctx.clone())
            .for_each(|result| async move {
                match result {
                    Ok(object) => tracing::debug!(?object, "assignment reconciled"),
                    Err(error) => tracing::error!(%error, "assignment controller error"),
                }
            })
    };

    let gitops_controller = {
        let for_policies = gitops_store.clone();
        let for_assignments = gitops_store.clone();
        let for_cluster_types = gitops_store.clone();
        Controller::new(Api::<GitOpsRepo>::all(client.clone()), cfg())
            .watches(
                Api::<SchedulingPolicy>::all(client.clone()),
                cfg(),
                move |policy| {
                    // only a policy that settled Ready should trigger a PR pass
                    if status_is_ready(policy.status.as_ref().map(|s| &s.conditions)) {
                        repos_in_namespace(&for_policies, policy.namespace())
                    } else {
                        Vec::new()
                    }
                },
            )
            .watches(
                Api::<Assignment>::all(client.clone()),
                cfg(),
                move |assignment| {
                    if status_is_ready(assignment.status.as_ref().map(|s| &s.conditions)) {
                        repos_in_namespace(&for_assignments, assignment.namespace())
                    } else {
                        Vec::new()
                    }
                },
            )
            .watches(Api::<ClusterType>::all(client.clone()), cfg(), move |ct| {
                repos_in_namespace(&for_cluster_types, ct.namespace())
            })
            .shutdown_on_signal()
            .run(gitops_repo::reconcile, gitops_repo::error_policy, ctx.clone())
            .for_each(|result| async move {
                match result {
                    Ok(object) => tracing::debug!(?object, "gitops repo reconciled"),
                    Err(error) => tracing::error!(%error, "gitops repo controller error"),
                }
            })
    };

    let environment_controller = Controller::new(Api::<Environment>::all(client.clone()), cfg())
        .shutdown_on_signal()
        .run(environment::reconcile, environment::error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok(object) => tracing::debug!(?object, "environment reconciled"),
                Err(error) => tracing::error!(%error, "environment controller error"),
            }
        });

    let base_repo_controller = Controller::new(Api::<BaseRepo>::all(client.clone()), cfg())
        .shutdown_on_signal()
        .run(base_repo::reconcile, base_repo::error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok(object) => tracing::debug!(?object, "base repo reconciled"),
                Err(error) => tracing::error!(%error, "base repo controller error"),
            }
        });

    let registration_controller =
        Controller::new(Api::<WorkloadRegistration>::all(client.clone()), cfg())
            .shutdown_on_signal()
            .run(
                workload_registration::reconcile,
                workload_registration::error_policy,
                ctx.clone(),
            )
            .for_each(|result| async move {
                match result {
                    Ok(object) => tracing::debug!(?object, "workload registration reconciled"),
                    Err(error) => tracing::error!(%error, "workload registration controller error"),
                }
            });

    tokio::select! {
        _ = workload_controller => tracing::info!("workload controller completed"),
        _ = policy_controller => tracing::info!("scheduling policy controller completed"),
        _ = assignment_controller => tracing::info!("assignment controller completed"),
        _ = gitops_controller => tracing::info!("gitops repo controller completed"),
        _ = environment_controller => tracing::info!("environment controller completed"),
        _ = base_repo_controller => tracing::info!("base repo controller completed"),
        _ = registration_controller => tracing::info!("workload registration controller completed"),
    }
}
