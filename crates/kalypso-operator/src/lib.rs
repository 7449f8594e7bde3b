//! Kubernetes controllers for the Kalypso scheduler.
//!
//! Five interacting reconcilers (Workload → DeploymentTarget,
//! SchedulingPolicy → Assignment, Assignment → AssignmentPackage,
//! GitOpsRepo → pull request, plus the thin flux-proxy translators) driven
//! by the kube runtime: per-object serial, cross-object parallel.

pub mod context;
pub mod controller;
pub mod crds;
pub mod flux;
pub mod runner;

pub use context::Context;
