//! Assignment reconciler
//!
//! Compiles one AssignmentPackage per Assignment: resolve platform config,
//! validate it against every applicable schema, then expand the cluster
//! type's reconciler, namespace and config templates. Failures are mirrored
//! to a GitHub issue, deduplicated through the message hash stored in
//! `status.gitIssueStatus`.

use std::sync::Arc;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::info;

use kalypso_common::conditions::{reason, set_condition, Condition, ConditionStatus};
use kalypso_common::crd::{
    Assignment, AssignmentPackage, AssignmentPackageSpec, ClusterType, ConfigSchema,
    DeploymentTarget, GitIssueStatus, Template, CLUSTER_TYPE_LABEL, DEPLOYMENT_TARGET_LABEL,
    PLATFORM_CONFIG_LABEL, WORKLOAD_LABEL,
};
use kalypso_common::hash::hash_string_of;
use kalypso_common::{Error, Result};
use kalypso_scheduler::{config, validator, Templater};

use super::{find_gitops_repo, ready, update_failed, FIELD_MANAGER};
use crate::context::Context;

/// Title of the issue mirroring a failing assignment.
pub fn issue_title(assignment: &Assignment, namespace: &str) -> String {
    format!(
        "Can't generate manifests for deployment target {} in cluster type {} in {} environment",
        assignment.spec.deployment_target, assignment.spec.cluster_type, namespace
    )
}

/// Reconcile an Assignment.
pub async fn reconcile(assignment: Arc<Assignment>, ctx: Arc<Context>) -> Result<Action, Error> {
    if assignment.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let namespace = assignment
        .namespace()
        .ok_or_else(|| Error::internal("assignment without namespace"))?;
    info!(assignment = %assignment.name_any(), %namespace, "reconciling assignment");

    let api: Api<Assignment> = Api::namespaced(ctx.client.clone(), &namespace);
    let mut conditions = assignment
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    set_condition(
        &mut conditions,
        ready(
            ConditionStatus::False,
            reason::REBUILDING_ASSIGNMENT_PACKAGE,
        ),
    );
    patch_status(&api, &assignment.name_any(), &conditions, None).await?;

    match build_package(&assignment, &namespace, &ctx).await {
        Ok(package) => {
            apply_package(&assignment, &namespace, &ctx, package).await?;

            set_condition(
                &mut conditions,
                ready(ConditionStatus::True, reason::ASSIGNMENT_PACKAGE_CREATED),
            );
            patch_status(&api, &assignment.name_any(), &conditions, None).await?;

            let issue_status =
                update_github_issue(&assignment, &namespace, &ctx, None).await?;
            patch_status(&api, &assignment.name_any(), &conditions, Some(&issue_status)).await?;

            Ok(Action::await_change())
        }
        Err(err) => {
            tracing::error!(
                assignment = %assignment.name_any(),
                error = %err,
                "failed to build assignment package"
            );
            set_condition(&mut conditions, update_failed(&err));
            patch_status(&api, &assignment.name_any(), &conditions, None).await?;

            let issue_status =
                update_github_issue(&assignment, &namespace, &ctx, Some(err.to_string())).await?;
            patch_status(&api, &assignment.name_any(), &conditions, Some(&issue_status)).await?;

            Err(err)
        }
    }
}

/// Compile the package spec for an assignment.
async fn build_package(
    assignment: &Assignment,
    namespace: &str,
    ctx: &Context,
) -> Result<AssignmentPackageSpec> {
    let cluster_types: Api<ClusterType> = Api::namespaced(ctx.client.clone(), namespace);
    let targets: Api<DeploymentTarget> = Api::namespaced(ctx.client.clone(), namespace);
    let templates: Api<Template> = Api::namespaced(ctx.client.clone(), namespace);
    let config_maps: Api<ConfigMap> = Api::namespaced(ctx.client.clone(), namespace);
    let schemas: Api<ConfigSchema> = Api::namespaced(ctx.client.clone(), namespace);

    let cluster_type = cluster_types.get(&assignment.spec.cluster_type).await?;
    let target = targets.get(&assignment.spec.deployment_target).await?;

    let platform_maps = config_maps
        .list(&ListParams::default().labels(&format!("{PLATFORM_CONFIG_LABEL}=true")))
        .await?
        .items;
    let config_data = config::resolve(&platform_maps, &cluster_type, &target)?;

    let all_schemas = schemas.list(&ListParams::default()).await?.items;
    validate_config(&config_data, &all_schemas, &cluster_type, &target)?;

    let templater = Templater::new(&target, &cluster_type, config_data);

    let reconciler_template = templates.get(&cluster_type.spec.reconciler).await?;
    let reconciler_manifests = templater.process(&reconciler_template)?;

    let namespace_template = templates.get(&cluster_type.spec.namespace_service).await?;
    let namespace_manifests = templater.process(&namespace_template)?;

    let (config_manifests, config_manifests_content_type) = match &cluster_type.spec.config_type {
        Some(config_type) if !config_type.is_empty() => {
            let config_template = templates.get(config_type).await?;
            (
                templater.process(&config_template)?,
                config_template.spec.content_type,
            )
        }
        _ => (Vec::new(), Default::default()),
    };

    Ok(AssignmentPackageSpec {
        reconciler_manifests,
        namespace_manifests,
        config_manifests,
        config_manifests_content_type,
    })
}

/// Validate the resolved config against every matching ConfigSchema and
/// every inline schema of the deployment target, aggregating all failures
/// into one message.
pub fn validate_config(
    config_data: &config::ConfigData,
    all_schemas: &[ConfigSchema],
    cluster_type: &ClusterType,
    target: &DeploymentTarget,
) -> Result<()> {
    let mut applicable: Vec<&str> = all_schemas
        .iter()
        .filter(|schema| config::is_config_for(schema.labels(), cluster_type, target))
        .map(|schema| schema.spec.schema.as_str())
        .collect();
    applicable.extend(target.spec.config_schemas.iter().map(String::as_str));

    let mut failures = Vec::new();
    for schema in applicable {
        match validator::validate(config_data, schema) {
            Ok(()) => {}
            Err(Error::SchemaValidation { message }) => failures.push(message),
            Err(other) => return Err(other),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaValidation {
            message: failures.join("\n"),
        })
    }
}

/// Server-side apply the package, owned by and labeled for its assignment.
async fn apply_package(
    assignment: &Assignment,
    namespace: &str,
    ctx: &Context,
    spec: AssignmentPackageSpec,
) -> Result<()> {
    let mut package = AssignmentPackage::new(&assignment.name_any(), spec);
    package.metadata.namespace = Some(namespace.to_string());
    package.metadata.labels = Some(
        [
            (CLUSTER_TYPE_LABEL.to_string(), assignment.spec.cluster_type.clone()),
            (WORKLOAD_LABEL.to_string(), assignment.spec.workload.clone()),
            (
                DEPLOYMENT_TARGET_LABEL.to_string(),
                assignment.spec.deployment_target.clone(),
            ),
        ]
        .into(),
    );
    package.metadata.owner_references = assignment
        .controller_owner_ref(&())
        .map(|reference| vec![reference]);

    let api: Api<AssignmentPackage> = Api::namespaced(ctx.client.clone(), namespace);
    api.patch(
        &package.name_any(),
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&package),
    )
    .await?;

    info!(package = %package.name_any(), "applied assignment package");
    Ok(())
}

/// Create, edit or close the mirroring issue, but only when the message
/// hash moved; `None` drives closure and its hash is a distinct sentinel,
/// so repeated successes skip the remote entirely.
async fn update_github_issue(
    assignment: &Assignment,
    namespace: &str,
    ctx: &Context,
    message: Option<String>,
) -> Result<GitIssueStatus> {
    let current = assignment
        .status
        .as_ref()
        .map(|s| s.git_issue_status.clone())
        .unwrap_or_default();

    let message_hash = hash_string_of(&message)?;
    if message_hash == current.content_hash {
        return Ok(current);
    }

    let gitops_repo = find_gitops_repo(&ctx.client, namespace).await?;
    let remote = ctx.github.for_repo(&gitops_repo.spec)?;
    let issue_no = remote
        .update_issue(
            current.issue_no,
            &issue_title(assignment, namespace),
            message.as_deref(),
        )
        .await?;

    Ok(GitIssueStatus {
        issue_no,
        content_hash: message_hash,
    })
}

async fn patch_status(
    api: &Api<Assignment>,
    name: &str,
    conditions: &[Condition],
    issue_status: Option<&GitIssueStatus>,
) -> Result<()> {
    let status = match issue_status {
        Some(issue_status) => json!({
            "conditions": conditions,
            "gitIssueStatus": issue_status,
        }),
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
pub fn error_policy(assignment: Arc<Assignment>, error: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(assignment = %assignment.name_any(), %error, "assignment reconciliation error");
    super::error_policy_for(error)
}
