//! Error types for the Kalypso scheduler
//!
//! A single workspace-wide error enum keeps condition reporting uniform:
//! every reconciler maps a failure to `Ready=False, reason=UpdateFailed`
//! and consults `is_retryable` to decide between requeue and stop.

use thiserror::Error;

use crate::template::TemplateError;

/// Main error type for Kalypso operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    /// A referenced object does not exist (e.g. an Assignment pointing at a
    /// ClusterType that was deleted)
    #[error("{kind} {name} not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Name of the missing object
        name: String,
    },

    /// JSON Schema could not be parsed or compiled
    #[error("unable to validate schema: {message}")]
    SchemaEval {
        /// Description of what failed
        message: String,
    },

    /// Config data violated one or more schemas; `message` aggregates every
    /// failing schema, one line per error
    #[error("Config data validation failed: \n {message}")]
    SchemaValidation {
        /// Aggregated validation errors
        message: String,
    },

    /// Manifest template error (parse, render or recursion limit)
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Scheduling policy selector could not be compiled
    #[error("invalid label selector: {message}")]
    Selector {
        /// Description of what's invalid
        message: String,
    },

    /// GitHub API error
    #[error("github error: {message}")]
    Git {
        /// Description of what failed, including the response body when one
        /// was received
        message: String,
    },

    /// The configured base branch does not exist in the GitOps repository
    #[error("base branch {branch} not found")]
    BaseBranchMissing {
        /// Branch named in the GitOpsRepo spec
        branch: String,
    },

    /// More than one BaseRepo exists in a namespace
    #[error("There should be only one BaseRepo in the namespace")]
    BaseRepoCardinality,

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error: {message}")]
    Internal {
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a not-found error for a referenced object
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a schema evaluation error
    pub fn schema_eval(msg: impl Into<String>) -> Self {
        Self::SchemaEval {
            message: msg.into(),
        }
    }

    /// Create a git adapter error
    pub fn git(msg: impl Into<String>) -> Self {
        Self::Git {
            message: msg.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
        }
    }

    /// Whether a reconciler should requeue after this error.
    ///
    /// Declarative failures (schema violations, bad selectors, template
    /// errors) require a spec change and are not retried; transport-level
    /// failures are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                !matches!(source, kube::Error::Api(ae) if (400..500).contains(&ae.code))
            }
            Error::NotFound { .. } => false,
            Error::SchemaEval { .. } => false,
            Error::SchemaValidation { .. } => false,
            Error::Template(_) => false,
            Error::Selector { .. } => false,
            Error::Git { .. } => true,
            Error::BaseBranchMissing { .. } => true,
            Error::BaseRepoCardinality => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_validation_message_carries_prefix() {
        let err = Error::SchemaValidation {
            message: "- intRequired is required\n".to_string(),
        };
        assert!(err.to_string().starts_with("Config data validation failed:"));
        assert!(err.to_string().contains("intRequired"));
    }

    #[test]
    fn declarative_failures_are_not_retryable() {
        assert!(!Error::SchemaValidation {
            message: "x".into()
        }
        .is_retryable());
        assert!(!Error::not_found("ClusterType", "drone").is_retryable());
        assert!(!Error::BaseRepoCardinality.is_retryable());
        assert!(!Error::Selector {
            message: "bad operator".into()
        }
        .is_retryable());
    }

    #[test]
    fn transport_failures_are_retryable() {
        assert!(Error::git("502 from api.github.com").is_retryable());
        assert!(Error::internal("watcher desynced").is_retryable());
        assert!(Error::BaseBranchMissing {
            branch: "main".into()
        }
        .is_retryable());
    }

    #[test]
    fn base_repo_cardinality_message_is_stable() {
        // the message is surfaced verbatim in conditions
        assert_eq!(
            Error::BaseRepoCardinality.to_string(),
            "There should be only one BaseRepo in the namespace"
        );
    }
}
