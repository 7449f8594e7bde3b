//! Custom resource definitions for the Kalypso scheduler
//!
//! All kinds live in API group `scheduler.kalypso.io/v1alpha1` and are
//! namespaced; the namespace is the environment (e.g. `dev`, `prod`).

mod assignment;
mod assignment_package;
mod base_repo;
mod cluster_type;
mod config_schema;
mod deployment_target;
mod environment;
mod gitops_repo;
mod scheduling_policy;
mod template;
mod types;
mod workload;
mod workload_registration;

pub use assignment::{Assignment, AssignmentSpec, AssignmentStatus};
pub use assignment_package::{AssignmentPackage, AssignmentPackageSpec, AssignmentPackageStatus};
pub use base_repo::{BaseRepo, BaseRepoSpec, BaseRepoStatus};
pub use cluster_type::{ClusterType, ClusterTypeSpec, ClusterTypeStatus};
pub use config_schema::{ConfigSchema, ConfigSchemaSpec};
pub use deployment_target::{DeploymentTarget, DeploymentTargetSpec, DeploymentTargetStatus};
pub use environment::{Environment, EnvironmentSpec, EnvironmentStatus};
pub use gitops_repo::{ClusterContent, GitOpsRepo, GitOpsRepoSpec, GitOpsRepoStatus, RepoContent};
pub use scheduling_policy::{
    ClusterTypeSelectorSpec, DeploymentTargetSelectorSpec, SchedulingPolicy, SchedulingPolicySpec,
    SchedulingPolicyStatus,
};
pub use template::{Template, TemplateSpec};
pub use types::{ContentType, GitIssueStatus, ManifestsSpec};
pub use workload::{Workload, WorkloadDeploymentTarget, WorkloadSpec, WorkloadStatus};
pub use workload_registration::{
    WorkloadRegistration, WorkloadRegistrationSpec, WorkloadRegistrationStatus,
};

/// API group of every Kalypso kind.
pub const GROUP: &str = "scheduler.kalypso.io";
/// API version of every Kalypso kind.
pub const VERSION: &str = "v1alpha1";

/// Label carrying the owning workload name on DeploymentTargets and
/// AssignmentPackages.
pub const WORKLOAD_LABEL: &str = "workload";
/// Label carrying the workspace (tenancy grouping) on DeploymentTargets.
pub const WORKSPACE_LABEL: &str = "workspace";
/// Label carrying the cluster type name on AssignmentPackages and
/// platform ConfigMaps.
pub const CLUSTER_TYPE_LABEL: &str = "cluster-type";
/// Label carrying the deployment target name on AssignmentPackages and
/// platform ConfigMaps.
pub const DEPLOYMENT_TARGET_LABEL: &str = "deployment-target";
/// Label linking an Assignment to the SchedulingPolicy that produced it.
pub const SCHEDULING_POLICY_LABEL: &str = "scheduling-policy";
/// Marker label selecting ConfigMaps that contribute platform configuration.
pub const PLATFORM_CONFIG_LABEL: &str = "platform-config";

/// Label stamped by the upstream flux sync controller; the workload
/// reconciler derives the workspace from it.
pub const FLUX_OWNER_LABEL: &str = "kustomize.toolkit.fluxcd.io/name";
/// Companion namespace label stamped by the flux sync controller.
pub const FLUX_NAMESPACE_LABEL: &str = "kustomize.toolkit.fluxcd.io/namespace";
