//! GitOpsRepo reconciler — the debounce/commit state machine
//!
//! Aggregates every AssignmentPackage in the namespace into a repo content
//! tree, hashes it, and publishes one pull request per distinct hash. The
//! 3-second quiesce is expressed purely through the `ReadyToPR` condition
//! timestamp and requeue-after: no timers, and the state survives a crash
//! because the condition is the state.
//!
//! States: Idle (no `ReadyToPR`), Debouncing (`ReadyToPR` set, waiting out
//! the quiesce window), PRing (window expired, adapter called).

use std::sync::Arc;

use chrono::Utc;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::info;

use kalypso_common::conditions::{
    find_condition, is_condition_true, reason, remove_condition, set_condition, Condition,
    ConditionStatus, READY_CONDITION, READY_TO_PR_CONDITION,
};
use kalypso_common::crd::{
    Assignment, AssignmentPackage, BaseRepo, ClusterContent, ClusterType, GitOpsRepo, RepoContent,
    SchedulingPolicy, CLUSTER_TYPE_LABEL, DEPLOYMENT_TARGET_LABEL,
};
use kalypso_common::hash::hash_string_of;
use kalypso_common::{Error, Result};

use super::{ready, requeue, update_failed, REQUEUE_DELAY};
use crate::context::Context;

/// Branch name for the next deployment PR: UTC wall clock.
pub fn deployment_branch_name() -> String {
    format!("deployment/{}", Utc::now().format("%Y-%m-%d-%H-%M-%S"))
}

/// What one pass of the debounce machine should do.
#[derive(Debug, PartialEq, Eq)]
pub enum DebounceStep {
    /// Content matches the published hash; `stale_marker` says whether a
    /// leftover `ReadyToPR` condition must be dropped
    Quiescent { stale_marker: bool },
    /// Content moved and no window is open yet
    StartDebounce,
    /// A window is open but the quiesce time has not elapsed
    Wait,
    /// The window elapsed with the content still changed
    Publish,
}

/// Decide the next transition from the observed status.
///
/// The `ReadyToPR` condition timestamp is the entire debounce state;
/// `set_condition` keeps it stable while the condition stays true, so a
/// burst of content changes inside the window does not push the deadline
/// out.
pub fn debounce_step(
    conditions: &[Condition],
    stored_hash: &str,
    current_hash: &str,
    now: chrono::DateTime<Utc>,
) -> DebounceStep {
    if current_hash == stored_hash {
        return DebounceStep::Quiescent {
            stale_marker: is_condition_true(conditions, READY_TO_PR_CONDITION),
        };
    }

    match find_condition(conditions, READY_TO_PR_CONDITION) {
        None => DebounceStep::StartDebounce,
        Some(marker) => {
            let quiesce = chrono::Duration::from_std(REQUEUE_DELAY).unwrap_or_default();
            if now - marker.last_transition_time >= quiesce {
                DebounceStep::Publish
            } else {
                DebounceStep::Wait
            }
        }
    }
}

/// Whether an adapter error means the PR is already open (idempotent retry).
pub fn is_pr_already_exists(error: &Error) -> bool {
    error.to_string().contains("A pull request already exists")
}

/// Aggregate cluster types, assignment packages and the optional BaseRepo
/// into the tree one commit publishes.
pub fn build_repo_content(
    cluster_types: &[ClusterType],
    packages: &[AssignmentPackage],
    base_repos: &[BaseRepo],
) -> Result<RepoContent> {
    let mut content = RepoContent::default();

    for cluster_type in cluster_types {
        content
            .cluster_types
            .insert(cluster_type.name_any(), ClusterContent::default());
    }

    for package in packages {
        let labels = package.labels();
        let Some(cluster_type) = labels.get(CLUSTER_TYPE_LABEL) else {
            continue;
        };
        let Some(target) = labels.get(DEPLOYMENT_TARGET_LABEL) else {
            continue;
        };
        content
            .cluster_types
            .entry(cluster_type.clone())
            .or_default()
            .deployment_targets
            .insert(target.clone(), package.spec.clone());
    }

    match base_repos.len() {
        0 => {}
        1 => content.base_repo = Some(base_repos[0].spec.clone()),
        _ => return Err(Error::BaseRepoCardinality),
    }

    Ok(content)
}

/// Reconcile a GitOpsRepo.
pub async fn reconcile(repo: Arc<GitOpsRepo>, ctx: Arc<Context>) -> Result<Action, Error> {
    if repo.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let namespace = repo
        .namespace()
        .ok_or_else(|| Error::internal("gitops repo without namespace"))?;
    info!(repo = %repo.name_any(), %namespace, "reconciling gitops repo");

    let api: Api<GitOpsRepo> = Api::namespaced(ctx.client.clone(), &namespace);
    let mut conditions = repo
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    match run(&repo, &namespace, &ctx, &mut conditions).await {
        Ok(action) => Ok(action),
        Err(err) => {
            tracing::error!(repo = %repo.name_any(), error = %err, "gitops repo reconciliation failed");
            set_condition(&mut conditions, update_failed(&err));
            patch_status(&api, &repo.name_any(), &conditions, None).await?;
            Err(err)
        }
    }
}

async fn run(
    repo: &GitOpsRepo,
    namespace: &str,
    ctx: &Context,
    conditions: &mut Vec<Condition>,
) -> Result<Action> {
    let api: Api<GitOpsRepo> = Api::namespaced(ctx.client.clone(), namespace);

    // gate: every policy and every assignment must report Ready
    if !all_ready(&ctx.client, namespace).await? {
        info!(%namespace, "not all policies and assignments are ready");
        return Ok(Action::await_change());
    }

    let content = repo_content(&ctx.client, namespace).await?;
    let content_hash = hash_string_of(&content)?;
    let stored_hash = repo
        .status
        .as_ref()
        .map(|s| s.repo_content_hash.clone())
        .unwrap_or_default();

    match debounce_step(conditions, &stored_hash, &content_hash, Utc::now()) {
        DebounceStep::Quiescent { stale_marker } => {
            if stale_marker {
                remove_condition(conditions, READY_TO_PR_CONDITION);
                patch_status(&api, &repo.name_any(), conditions, None).await?;
            }
            return Ok(Action::await_change());
        }
        DebounceStep::StartDebounce => {
            info!(repo = %repo.name_any(), hash = %content_hash, "repo content changed, debouncing");
            set_condition(
                conditions,
                Condition::new(
                    READY_TO_PR_CONDITION,
                    ConditionStatus::True,
                    reason::READY_FOR_PR,
                    "",
                ),
            );
            patch_status(&api, &repo.name_any(), conditions, None).await?;
            return Ok(requeue());
        }
        DebounceStep::Wait => {
            // burst still settling; re-enter after the window
            return Ok(requeue());
        }
        DebounceStep::Publish => {}
    }

    // quiesced: publish
    set_condition(
        conditions,
        ready(ConditionStatus::False, reason::CREATING_PR),
    );
    patch_status(&api, &repo.name_any(), conditions, None).await?;

    info!(repo = %repo.name_any(), hash = %content_hash, "creating pull request");
    let remote = ctx.github.for_repo(&repo.spec)?;
    match remote.create_pr(&deployment_branch_name(), &content).await {
        Ok(_) => {}
        Err(err) if is_pr_already_exists(&err) => {
            info!(repo = %repo.name_any(), "pull request already exists");
        }
        Err(err) => return Err(err),
    }

    set_condition(conditions, ready(ConditionStatus::True, reason::PR_CREATED));
    remove_condition(conditions, READY_TO_PR_CONDITION);
    patch_status(&api, &repo.name_any(), conditions, Some(&content_hash)).await?;

    Ok(Action::await_change())
}

async fn all_ready(client: &Client, namespace: &str) -> Result<bool> {
    let policies: Api<SchedulingPolicy> = Api::namespaced(client.clone(), namespace);
    for policy in policies.list(&ListParams::default()).await?.items {
        let ready = policy
            .status
            .as_ref()
            .map(|s| is_condition_true(&s.conditions, READY_CONDITION))
            .unwrap_or(false);
        if !ready {
            return Ok(false);
        }
    }

    let assignments: Api<Assignment> = Api::namespaced(client.clone(), namespace);
    for assignment in assignments.list(&ListParams::default()).await?.items {
        let ready = assignment
            .status
            .as_ref()
            .map(|s| is_condition_true(&s.conditions, READY_CONDITION))
            .unwrap_or(false);
        if !ready {
            return Ok(false);
        }
    }

    Ok(true)
}

async fn repo_content(client: &Client, namespace: &str) -> Result<RepoContent> {
    let cluster_types: Api<ClusterType> = Api::namespaced(client.clone(), namespace);
    let packages: Api<AssignmentPackage> = Api::namespaced(client.clone(), namespace);
    let base_repos: Api<BaseRepo> = Api::namespaced(client.clone(), namespace);

    build_repo_content(
        &cluster_types.list(&ListParams::default()).await?.items,
        &packages.list(&ListParams::default()).await?.items,
        &base_repos.list(&ListParams::default()).await?.items,
    )
}

async fn patch_status(
    api: &Api<GitOpsRepo>,
    name: &str,
    conditions: &[Condition],
    content_hash: Option<&str>,
) -> Result<()> {
    let status = match content_hash {
        Some(hash) => json!({ "conditions": conditions, "repoContentHash": hash }),
        None => json!({ "conditions": conditions }),
    };
    api.patch_status(
        name,
        &PatchParams::default(),
        &Patch::Merge(&json!({ "status": status })),
    )
    .await?;
    Ok(())
}

/// Error policy: requeue transients, wait out declarative failures.
pub fn error_policy(repo: Arc<GitOpsRepo>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(repo = %repo.name_any(), %error, "gitops repo reconciliation error");
    super::error_policy_for(error)
}
