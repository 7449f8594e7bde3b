//! Reconcilers
//!
//! Each submodule hosts one controller: a `reconcile` function, an
//! `error_policy`, and the pure planning helpers its tests exercise.
//! Failures never panic out of a reconciler; they become
//! `Ready=False, reason=UpdateFailed` conditions, and the error policy
//! requeues transients after 3 s while declarative failures wait for a
//! spec change.

pub mod assignment;
pub mod base_repo;
pub mod environment;
pub mod gitops_repo;
pub mod scheduling_policy;
pub mod workload;
pub mod workload_registration;

use std::fmt::Debug;
use std::time::Duration;

use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use kalypso_common::conditions::{self, Condition, ConditionStatus, READY_CONDITION};
use kalypso_common::crd::GitOpsRepo;
use kalypso_common::{Error, Result};

/// Requeue delay applied after transient failures and for the PR debounce.
pub const REQUEUE_DELAY: Duration = Duration::from_secs(3);

/// Field manager used for every scheduler-side apply.
pub const FIELD_MANAGER: &str = "kalypso-scheduler";

/// The standard requeue action.
pub fn requeue() -> Action {
    Action::requeue(REQUEUE_DELAY)
}

/// Error policy shared by all controllers: transient errors retry after
/// 3 s, declarative failures wait for the user to change a spec.
pub fn error_policy_for(error: &Error) -> Action {
    if error.is_retryable() {
        requeue()
    } else {
        Action::await_change()
    }
}

/// Patch an object's status conditions (merge patch).
pub async fn patch_conditions<K>(api: &Api<K>, name: &str, conditions: &[Condition]) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.patch_status(
        name,
        &PatchParams::default(),
        &Patch::Merge(&json!({ "status": { "conditions": conditions } })),
    )
    .await?;
    Ok(())
}

/// Build the `Ready=False, reason=UpdateFailed` condition for an error.
pub fn update_failed(error: &Error) -> Condition {
    Condition::new(
        READY_CONDITION,
        ConditionStatus::False,
        conditions::reason::UPDATE_FAILED,
        error.to_string(),
    )
}

/// Build a `Ready` condition without a message.
pub fn ready(status: ConditionStatus, reason: &str) -> Condition {
    Condition::new(READY_CONDITION, status, reason, "")
}

/// The GitOpsRepo of a namespace; every environment is expected to carry
/// exactly one, and the first is used.
pub async fn find_gitops_repo(client: &Client, namespace: &str) -> Result<GitOpsRepo> {
    let api: Api<GitOpsRepo> = Api::namespaced(client.clone(), namespace);
    let repos = api.list(&ListParams::default()).await?;
    repos
        .items
        .into_iter()
        .next()
        .ok_or_else(|| Error::internal(format!("no GitOps repo found in namespace {namespace}")))
}

/// Finalizer guarding external flux resources.
pub const FLUX_FINALIZER: &str = "scheduler.kalypso.io/flux-resources";

/// Make sure the flux finalizer is present; returns true when it had to be
/// added (callers requeue to observe the update).
pub async fn ensure_flux_finalizer<K>(api: &Api<K>, object: &K) -> Result<bool>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    if object.finalizers().iter().any(|f| f.as_str() == FLUX_FINALIZER) {
        return Ok(false);
    }

    let mut finalizers = object.finalizers().to_vec();
    finalizers.push(FLUX_FINALIZER.to_string());
    api.patch(
        &object.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&json!({ "metadata": { "finalizers": finalizers } })),
    )
    .await?;
    Ok(true)
}

/// Drop the flux finalizer after external cleanup succeeded.
pub async fn remove_flux_finalizer<K>(api: &Api<K>, object: &K) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let finalizers: Vec<String> = object
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != FLUX_FINALIZER)
        .cloned()
        .collect();
    api.patch(
        &object.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&json!({ "metadata": { "finalizers": finalizers } })),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_policy_requeues_transients_only() {
        let transient = Error::git("503");
        let declarative = Error::SchemaValidation {
            message: "- x\n".into(),
        };
        assert_eq!(
            format!("{:?}", error_policy_for(&transient)),
            format!("{:?}", requeue())
        );
        assert_eq!(
            format!("{:?}", error_policy_for(&declarative)),
            format!("{:?}", Action::await_change())
        );
    }

    #[test]
    fn update_failed_carries_the_error_message() {
        let condition = update_failed(&Error::not_found("ClusterType", "drone"));
        assert_eq!(condition.type_, READY_CONDITION);
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "UpdateFailed");
        assert!(condition.message.contains("ClusterType drone not found"));
    }
}
