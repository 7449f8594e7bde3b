//! Kubernetes-convention conditions for status reporting
//!
//! All Kalypso resources carry a `conditions` array in their status. The
//! helpers here mirror the apimachinery semantics: setting a condition whose
//! status did not change keeps the original `lastTransitionTime`. The
//! GitOpsRepo debounce machine reads that timestamp, so the preservation
//! rule is load-bearing, not cosmetic.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition types used across the scheduler.
pub const READY_CONDITION: &str = "Ready";
/// Set while a GitOpsRepo change is being debounced before PR creation.
pub const READY_TO_PR_CONDITION: &str = "ReadyToPR";
/// Reserved for PR-level reporting.
pub const PR_CONDITION: &str = "PR";

/// Machine-readable condition reasons; these strings are part of the
/// observable API.
pub mod reason {
    pub const UPDATE_FAILED: &str = "UpdateFailed";
    pub const DEPLOYMENT_TARGETS_CREATED: &str = "DeploymentTargetsCreated";
    pub const RESCHEDULING: &str = "Rescheduling";
    pub const ASSIGNMENTS_CREATED: &str = "AssignmentsCreated";
    pub const SCHEDULED: &str = "Scheduled";
    pub const REBUILDING_ASSIGNMENT_PACKAGE: &str = "RebuildingAssignmentPackage";
    pub const ASSIGNMENT_PACKAGE_CREATED: &str = "AssignmentPackageCreated";
    pub const READY_FOR_PR: &str = "ReadyForPR";
    pub const CREATING_PR: &str = "CreatingPR";
    pub const PR_CREATED: &str = "PRCreated";
    pub const FLUX_RESOURCES_CREATED: &str = "FluxResourcesCreated";
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g. Ready, ReadyToPR)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the condition transitioned between statuses
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition stamped with the current time
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Set or update a condition in place.
///
/// When a condition of the same type already exists and its status is
/// unchanged, the stored `lastTransitionTime` is kept; reason and message
/// are always refreshed.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                existing.reason = condition.reason;
                existing.message = condition.message;
            } else {
                *existing = condition;
            }
        }
        None => conditions.push(condition),
    }
}

/// Remove a condition by type; no-op when absent.
pub fn remove_condition(conditions: &mut Vec<Condition>, type_: &str) {
    conditions.retain(|c| c.type_ != type_);
}

/// Find a condition by type.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Whether a condition of the given type exists with status `True`.
pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_)
        .map(|c| c.status == ConditionStatus::True)
        .unwrap_or(false)
}
