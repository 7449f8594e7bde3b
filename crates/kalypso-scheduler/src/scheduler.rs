//! Policy scheduler
//!
//! Given a SchedulingPolicy, computes the set of (cluster-type,
//! deployment-target) pairs that satisfy both selectors and emits canonical
//! Assignment objects. Selectors are compiled once at construction; an
//! invalid selector fails the whole policy.

use kube::ResourceExt;

use kalypso_common::crd::{
    Assignment, AssignmentSpec, ClusterType, DeploymentTarget, SchedulingPolicy,
    SCHEDULING_POLICY_LABEL,
};
use kalypso_common::labels::LabelSelector;
use kalypso_common::Result;

/// A compiled scheduling policy
pub struct Scheduler {
    policy_name: String,
    workspace: String,
    cluster_type_selector: LabelSelector,
    deployment_target_selector: LabelSelector,
}

impl Scheduler {
    /// Compile the policy's selectors.
    pub fn new(policy: &SchedulingPolicy) -> Result<Self> {
        let cluster_type_selector = policy.spec.cluster_type_selector.label_selector.clone();
        cluster_type_selector.compile()?;

        let deployment_target_selector = policy
            .spec
            .deployment_target_selector
            .label_selector
            .clone();
        deployment_target_selector.compile()?;

        Ok(Self {
            policy_name: policy.name_any(),
            workspace: policy.spec.deployment_target_selector.workspace.clone(),
            cluster_type_selector,
            deployment_target_selector,
        })
    }

    /// Whether the cluster type's labels satisfy the policy.
    pub fn is_cluster_type_compliant(&self, cluster_type: &ClusterType) -> bool {
        self.cluster_type_selector.matches(cluster_type.labels())
    }

    /// Whether the deployment target satisfies the policy, including the
    /// workspace gate when the policy names one.
    pub fn is_deployment_target_compliant(&self, target: &DeploymentTarget) -> bool {
        if !self.workspace.is_empty() && self.workspace != target.workspace() {
            return false;
        }
        self.deployment_target_selector.matches(target.labels())
    }

    /// Filter cluster types down to the compliant ones.
    pub fn select_cluster_types<'a>(&self, all: &'a [ClusterType]) -> Vec<&'a ClusterType> {
        all.iter()
            .filter(|ct| self.is_cluster_type_compliant(ct))
            .collect()
    }

    /// Filter deployment targets down to the compliant ones.
    pub fn select_deployment_targets<'a>(
        &self,
        all: &'a [DeploymentTarget],
    ) -> Vec<&'a DeploymentTarget> {
        all.iter()
            .filter(|dt| self.is_deployment_target_compliant(dt))
            .collect()
    }

    /// Build the assignment matrix: the cartesian product of compliant
    /// cluster types and deployment targets, deterministically ordered by
    /// (workload, deploymentTarget, clusterType).
    pub fn schedule(
        &self,
        cluster_types: &[ClusterType],
        deployment_targets: &[DeploymentTarget],
    ) -> Vec<Assignment> {
        let selected_targets = self.select_deployment_targets(deployment_targets);
        let selected_cluster_types = self.select_cluster_types(cluster_types);

        let mut assignments: Vec<Assignment> = Vec::new();
        for cluster_type in &selected_cluster_types {
            for target in &selected_targets {
                assignments.push(self.assign(target, cluster_type));
            }
        }

        assignments.sort_by(|a, b| {
            (&a.spec.workload, &a.spec.deployment_target, &a.spec.cluster_type).cmp(&(
                &b.spec.workload,
                &b.spec.deployment_target,
                &b.spec.cluster_type,
            ))
        });

        assignments
    }

    fn assign(&self, target: &DeploymentTarget, cluster_type: &ClusterType) -> Assignment {
        let spec = AssignmentSpec {
            workload: target.workload(),
            deployment_target: target.name_any(),
            cluster_type: cluster_type.name_any(),
        };

        let mut assignment = Assignment::new(&spec.compose_name(), spec);
        assignment
            .labels_mut()
            .insert(SCHEDULING_POLICY_LABEL.to_string(), self.policy_name.clone());
        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use kalypso_common::crd::{
        ClusterTypeSpec, DeploymentTargetSpec, SchedulingPolicySpec, WORKLOAD_LABEL,
        WORKSPACE_LABEL,
    };
    use kalypso_common::labels::{
        LabelSelectorRequirement, SelectorOperator,
    };

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn cluster_type(name: &str, extra: &[(&str, &str)]) -> ClusterType {
        let mut ct = ClusterType::new(
            name,
            ClusterTypeSpec {
                reconciler: "arc-flux".into(),
                namespace_service: "default-namespace".into(),
                config_type: None,
            },
        );
        ct.metadata.labels = Some(labels(extra));
        ct
    }

    fn deployment_target(name: &str, workload: &str, workspace: &str, extra: &[(&str, &str)]) -> DeploymentTarget {
        let mut dt = DeploymentTarget::new(
            name,
            DeploymentTargetSpec {
                environment: "dev".into(),
                ..Default::default()
            },
        );
        let mut all = labels(extra);
        all.insert(WORKLOAD_LABEL.into(), workload.into());
        all.insert(WORKSPACE_LABEL.into(), workspace.into());
        dt.metadata.labels = Some(all);
        dt
    }

    fn policy(name: &str, spec: SchedulingPolicySpec) -> SchedulingPolicy {
        SchedulingPolicy::new(name, spec)
    }

    fn policy_spec(workspace: &str, ct_labels: &[(&str, &str)], dt_labels: &[(&str, &str)]) -> SchedulingPolicySpec {
        let spec: SchedulingPolicySpec = serde_json::from_value(serde_json::json!({
            "deploymentTargetSelector": {
                "workspace": workspace,
                "labelSelector": {"matchLabels": dt_labels.iter().cloned().collect::<BTreeMap<_,_>>()}
            },
            "clusterTypeSelector": {
                "labelSelector": {"matchLabels": ct_labels.iter().cloned().collect::<BTreeMap<_,_>>()}
            }
        }))
        .unwrap();
        spec
    }

    #[test]
    fn schedules_the_cartesian_product() {
        let scheduler = Scheduler::new(&policy("eu-test", policy_spec("", &[("region", "eu")], &[])))
            .unwrap();

        let cluster_types = vec![
            cluster_type("drone", &[("region", "eu")]),
            cluster_type("large", &[("region", "eu")]),
            cluster_type("us-east", &[("region", "us")]),
        ];
        let targets = vec![
            deployment_target("app1-test", "app1", "team-a", &[]),
            deployment_target("app2-test", "app2", "team-a", &[]),
        ];

        let assignments = scheduler.schedule(&cluster_types, &targets);
        assert_eq!(assignments.len(), 4);

        let names: Vec<String> = assignments.iter().map(|a| a.name_any()).collect();
        assert_eq!(
            names,
            vec![
                "app1-app1-test-drone",
                "app1-app1-test-large",
                "app2-app2-test-drone",
                "app2-app2-test-large",
            ]
        );
        for assignment in &assignments {
            assert_eq!(
                assignment.labels().get(SCHEDULING_POLICY_LABEL).map(String::as_str),
                Some("eu-test")
            );
        }
    }

    #[test]
    fn workspace_gate_filters_targets() {
        let scheduler =
            Scheduler::new(&policy("team-a-policy", policy_spec("team-a", &[], &[]))).unwrap();

        let cluster_types = vec![cluster_type("drone", &[])];
        let targets = vec![
            deployment_target("app1-test", "app1", "team-a", &[]),
            deployment_target("app2-test", "app2", "team-b", &[]),
        ];

        let assignments = scheduler.schedule(&cluster_types, &targets);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].spec.workload, "app1");
    }

    #[test]
    fn empty_workspace_matches_any_target() {
        let scheduler = Scheduler::new(&policy("all", policy_spec("", &[], &[]))).unwrap();
        let targets = vec![deployment_target("app1-test", "app1", "team-b", &[])];
        assert!(scheduler.is_deployment_target_compliant(&targets[0]));
    }

    #[test]
    fn target_label_selector_applies() {
        let scheduler = Scheduler::new(&policy(
            "test-only",
            policy_spec("", &[], &[("purpose", "test")]),
        ))
        .unwrap();

        let selected = deployment_target("app1-test", "app1", "team-a", &[("purpose", "test")]);
        let skipped = deployment_target("app1-prod", "app1", "team-a", &[("purpose", "prod")]);
        assert!(scheduler.is_deployment_target_compliant(&selected));
        assert!(!scheduler.is_deployment_target_compliant(&skipped));
    }

    #[test]
    fn match_expressions_are_honored() {
        let mut spec = policy_spec("", &[], &[]);
        spec.cluster_type_selector.label_selector.match_expressions =
            vec![LabelSelectorRequirement {
                key: "region".into(),
                operator: SelectorOperator::In,
                values: vec!["eu".into(), "us".into()],
            }];
        let scheduler = Scheduler::new(&policy("regional", spec)).unwrap();

        assert!(scheduler.is_cluster_type_compliant(&cluster_type("drone", &[("region", "eu")])));
        assert!(!scheduler.is_cluster_type_compliant(&cluster_type("apac", &[("region", "apac")])));
    }

    #[test]
    fn invalid_selector_fails_compilation() {
        let mut spec = policy_spec("", &[], &[]);
        spec.deployment_target_selector
            .label_selector
            .match_expressions = vec![LabelSelectorRequirement {
            key: "region".into(),
            operator: SelectorOperator::In,
            values: vec![],
        }];
        assert!(Scheduler::new(&policy("broken", spec)).is_err());
    }

    #[test]
    fn rescheduling_is_deterministic() {
        let scheduler = Scheduler::new(&policy("all", policy_spec("", &[], &[]))).unwrap();
        let cluster_types = vec![cluster_type("b", &[]), cluster_type("a", &[])];
        let targets = vec![
            deployment_target("z-test", "z", "team-a", &[]),
            deployment_target("a-test", "a", "team-a", &[]),
        ];

        let first = scheduler.schedule(&cluster_types, &targets);
        let second = scheduler.schedule(&cluster_types, &targets);
        assert_eq!(
            first.iter().map(|a| a.name_any()).collect::<Vec<_>>(),
            second.iter().map(|a| a.name_any()).collect::<Vec<_>>()
        );
        // sorted by workload first
        assert_eq!(first[0].spec.workload, "a");
    }
}
