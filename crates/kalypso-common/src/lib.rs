//! Shared types for the Kalypso scheduler.
//!
//! Home of the custom resource definitions, the Kubernetes-convention
//! condition helpers, the label-selector matcher, the structural hash used
//! for idempotence checks, and the manifest template engine.

pub mod conditions;
pub mod crd;
pub mod error;
pub mod hash;
pub mod labels;
pub mod telemetry;
pub mod template;

pub use error::Error;

/// Result alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;
