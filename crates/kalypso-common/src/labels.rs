//! Label selectors over plain label maps
//!
//! Scheduling policies select cluster types and deployment targets with the
//! standard Kubernetes selector shape: `matchLabels` plus `matchExpressions`
//! with the In / NotIn / Exists / DoesNotExist operators. The matcher works
//! on `BTreeMap<String, String>` label sets so it can run against any object
//! metadata without a live cluster.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Label set carried by an object.
pub type LabelSet = BTreeMap<String, String>;

/// A label selector in the Kubernetes shape.
///
/// An empty selector matches everything.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Exact-match requirements; every entry must be present with the given
    /// value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    /// Operator-based requirements, ANDed together
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// One operator-based requirement of a [`LabelSelector`].
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// Label key the requirement applies to
    pub key: String,

    /// One of In, NotIn, Exists, DoesNotExist
    pub operator: SelectorOperator,

    /// Values for In / NotIn; must be empty for Exists / DoesNotExist
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Selector operators supported by the scheduler.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl LabelSelector {
    /// Validate the selector shape once, ahead of matching.
    ///
    /// In/NotIn require at least one value; Exists/DoesNotExist forbid
    /// values. This mirrors `LabelSelectorAsSelector` which rejects the same
    /// combinations.
    pub fn compile(&self) -> Result<()> {
        for requirement in &self.match_expressions {
            match requirement.operator {
                SelectorOperator::In | SelectorOperator::NotIn => {
                    if requirement.values.is_empty() {
                        return Err(Error::Selector {
                            message: format!(
                                "operator {:?} on key {} requires at least one value",
                                requirement.operator, requirement.key
                            ),
                        });
                    }
                }
                SelectorOperator::Exists | SelectorOperator::DoesNotExist => {
                    if !requirement.values.is_empty() {
                        return Err(Error::Selector {
                            message: format!(
                                "operator {:?} on key {} must not carry values",
                                requirement.operator, requirement.key
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether the given label set satisfies the selector.
    pub fn matches(&self, labels: &LabelSet) -> bool {
        for (key, value) in &self.match_labels {
            if labels.get(key) != Some(value) {
                return false;
            }
        }

        for requirement in &self.match_expressions {
            let actual = labels.get(&requirement.key);
            let satisfied = match requirement.operator {
                SelectorOperator::In => {
                    actual.is_some_and(|v| requirement.values.iter().any(|candidate| candidate == v))
                }
                SelectorOperator::NotIn => {
                    !actual.is_some_and(|v| requirement.values.iter().any(|candidate| candidate == v))
                }
                SelectorOperator::Exists => actual.is_some(),
                SelectorOperator::DoesNotExist => actual.is_none(),
            };
            if !satisfied {
                return false;
            }
        }

        true
    }
}
