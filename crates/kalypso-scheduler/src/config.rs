//! Platform config resolution
//!
//! Platform configuration is sourced from ConfigMaps labeled
//! `platform-config=true` in the environment namespace. A ConfigMap applies
//! to a (cluster-type, deployment-target) pair when every non-infrastructure
//! label on it matches; selected maps are merged in name order, so
//! later-named maps override earlier ones key by key.
//!
//! Values are string-typed on the wire but semantically heterogeneous:
//! unquoted values that parse as YAML mappings or sequences are merged
//! structurally, everything else stays a literal string. Wrapping a value in
//! single quotes forces it to stay literal (templates strip the quotes with
//! the `unquote` filter).

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use serde_json::Value;

use kalypso_common::crd::{
    ClusterType, DeploymentTarget, CLUSTER_TYPE_LABEL, DEPLOYMENT_TARGET_LABEL,
    FLUX_NAMESPACE_LABEL, FLUX_OWNER_LABEL, PLATFORM_CONFIG_LABEL, WORKLOAD_LABEL,
};
use kalypso_common::Result;

/// Resolved platform configuration: sorted keys, structured values.
pub type ConfigData = BTreeMap<String, Value>;

/// Whether a labeled object (ConfigMap or ConfigSchema) applies to the given
/// (cluster-type, deployment-target) pair.
///
/// Infrastructure labels (the flux owner pair and the `platform-config`
/// marker) are ignored. The scheduler-owned keys match against the pair
/// directly; any other key must equal a label on either the cluster type or
/// the deployment target.
pub fn is_config_for(
    labels: &BTreeMap<String, String>,
    cluster_type: &ClusterType,
    target: &DeploymentTarget,
) -> bool {
    for (key, value) in labels {
        match key.as_str() {
            FLUX_OWNER_LABEL | FLUX_NAMESPACE_LABEL | PLATFORM_CONFIG_LABEL => continue,
            CLUSTER_TYPE_LABEL => {
                if *value != cluster_type.name_any() {
                    return false;
                }
            }
            DEPLOYMENT_TARGET_LABEL => {
                if *value != target.name_any() {
                    return false;
                }
            }
            WORKLOAD_LABEL => {
                if *value != target.workload() {
                    return false;
                }
            }
            other => {
                let on_cluster_type = cluster_type.labels().get(other) == Some(value);
                let on_target = target.labels().get(other) == Some(value);
                if !on_cluster_type && !on_target {
                    return false;
                }
            }
        }
    }
    true
}

/// Merge the data of every matching ConfigMap into one structured mapping.
pub fn resolve(
    config_maps: &[ConfigMap],
    cluster_type: &ClusterType,
    target: &DeploymentTarget,
) -> Result<ConfigData> {
    let mut selected: Vec<&ConfigMap> = config_maps
        .iter()
        .filter(|cm| is_config_for(cm.labels(), cluster_type, target))
        .collect();
    selected.sort_by_key(|cm| cm.name_any());

    let mut config_data = ConfigData::new();
    for config_map in selected {
        let Some(data) = &config_map.data else {
            continue;
        };
        for (key, raw) in data {
            let parsed = parse_value(raw);
            let merged = match config_data.remove(key) {
                Some(existing) => merge_values(existing, parsed),
                None => parsed,
            };
            config_data.insert(key.clone(), merged);
        }
    }

    Ok(config_data)
}

/// Parse one ConfigMap value.
///
/// Single-quoted values are forced literal. Everything else is tried as
/// YAML; only mappings and sequences keep their structured form, scalar
/// parses revert to the raw string.
pub fn parse_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        return Value::String(raw.to_string());
    }

    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

/// Structural merge of two config values.
///
/// Mappings merge recursively. Sequences merge element-wise by the `name`
/// key when both elements are mappings; unmatched elements append. Any
/// other combination lets the new value replace the old one.
pub fn merge_values(old: Value, new: Value) -> Value {
    match (old, new) {
        (Value::Object(mut old_map), Value::Object(new_map)) => {
            for (key, new_entry) in new_map {
                let merged = match old_map.remove(&key) {
                    Some(old_entry) => merge_values(old_entry, new_entry),
                    None => new_entry,
                };
                old_map.insert(key, merged);
            }
            Value::Object(old_map)
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            Value::Array(merge_sequences(old_items, new_items))
        }
        (_, new) => new,
    }
}

fn merge_sequences(mut items: Vec<Value>, new_items: Vec<Value>) -> Vec<Value> {
    for new_item in new_items {
        let matched = element_name(&new_item).and_then(|name| {
            items
                .iter()
                .position(|existing| element_name(existing) == Some(name.clone()))
        });
        match matched {
            Some(index) => {
                let existing = items.remove(index);
                items.insert(index, merge_values(existing, new_item));
            }
            None => items.push(new_item),
        }
    }
    items
}

fn element_name(value: &Value) -> Option<String> {
    value
        .as_object()?
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use kalypso_common::crd::{ClusterTypeSpec, DeploymentTargetSpec, WORKSPACE_LABEL};

    fn cluster_type(name: &str, labels: &[(&str, &str)]) -> ClusterType {
        let mut ct = ClusterType::new(
            name,
            ClusterTypeSpec {
                reconciler: "arc-flux".into(),
                namespace_service: "default-namespace".into(),
                config_type: None,
            },
        );
        ct.metadata.labels = Some(to_map(labels));
        ct
    }

    fn target(name: &str, workload: &str, labels: &[(&str, &str)]) -> DeploymentTarget {
        let mut dt = DeploymentTarget::new(name, DeploymentTargetSpec::default());
        let mut all = to_map(labels);
        all.insert(WORKLOAD_LABEL.into(), workload.into());
        all.insert(WORKSPACE_LABEL.into(), "team-a".into());
        dt.metadata.labels = Some(all);
        dt
    }

    fn to_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config_map(name: &str, labels: &[(&str, &str)], data: &[(&str, &str)]) -> ConfigMap {
        let mut labels = to_map(labels);
        labels.insert(PLATFORM_CONFIG_LABEL.into(), "true".into());
        ConfigMap {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            data: Some(to_map(data)),
            ..Default::default()
        }
    }

    #[test]
    fn selection_honors_the_clause_order() {
        let ct = cluster_type("drone", &[("region", "eu")]);
        let dt = target("app1-test", "app1", &[("purpose", "test")]);

        // scheduler-owned keys match the pair directly
        assert!(is_config_for(&to_map(&[("cluster-type", "drone")]), &ct, &dt));
        assert!(!is_config_for(&to_map(&[("cluster-type", "large")]), &ct, &dt));
        assert!(is_config_for(&to_map(&[("deployment-target", "app1-test")]), &ct, &dt));
        assert!(!is_config_for(&to_map(&[("deployment-target", "app2-test")]), &ct, &dt));
        assert!(is_config_for(&to_map(&[("workload", "app1")]), &ct, &dt));
        assert!(!is_config_for(&to_map(&[("workload", "app2")]), &ct, &dt));

        // free-form keys match either side's labels
        assert!(is_config_for(&to_map(&[("region", "eu")]), &ct, &dt));
        assert!(is_config_for(&to_map(&[("purpose", "test")]), &ct, &dt));
        assert!(!is_config_for(&to_map(&[("region", "us")]), &ct, &dt));

        // infrastructure labels never disqualify
        assert!(is_config_for(
            &to_map(&[
                (FLUX_OWNER_LABEL, "dev-control-plane"),
                (FLUX_NAMESPACE_LABEL, "flux-system"),
                (PLATFORM_CONFIG_LABEL, "true"),
            ]),
            &ct,
            &dt
        ));
    }

    #[test]
    fn maps_merge_in_name_order() {
        let ct = cluster_type("drone", &[]);
        let dt = target("app1-test", "app1", &[]);
        // passed out of order on purpose
        let maps = vec![
            config_map("b-override", &[], &[("endpoint", "override")]),
            config_map("a-base", &[], &[("endpoint", "base"), ("timeout", "30")]),
        ];

        let data = resolve(&maps, &ct, &dt).unwrap();
        assert_eq!(data["endpoint"], json!("override"));
        assert_eq!(data["timeout"], json!("30"));
    }

    #[test]
    fn non_matching_maps_are_ignored() {
        let ct = cluster_type("drone", &[]);
        let dt = target("app1-test", "app1", &[]);
        let maps = vec![
            config_map("for-us", &[("cluster-type", "large")], &[("a", "1")]),
            config_map("for-drone", &[("cluster-type", "drone")], &[("b", "2")]),
        ];

        let data = resolve(&maps, &ct, &dt).unwrap();
        assert!(!data.contains_key("a"));
        assert_eq!(data["b"], json!("2"));
    }

    #[test]
    fn scalar_values_stay_raw_strings() {
        // "30" parses as a YAML scalar, which reverts to the raw string
        assert_eq!(parse_value("30"), json!("30"));
        assert_eq!(parse_value("true"), json!("true"));
        assert_eq!(parse_value("plain text"), json!("plain text"));
    }

    #[test]
    fn structured_values_parse() {
        assert_eq!(parse_value("a: 1\nb: 2"), json!({"a": 1, "b": 2}));
        assert_eq!(parse_value("[1, 2]"), json!([1, 2]));
    }

    #[test]
    fn single_quoted_values_are_literal() {
        let raw = "'{a: 1}'";
        assert_eq!(parse_value(raw), json!("'{a: 1}'"));
    }

    #[test]
    fn mappings_deep_merge() {
        let ct = cluster_type("drone", &[]);
        let dt = target("app1-test", "app1", &[]);
        let maps = vec![
            config_map("a", &[], &[("svc", "host: a\nport: 80")]),
            config_map("b", &[], &[("svc", "port: 443\ntls: true")]),
        ];

        let data = resolve(&maps, &ct, &dt).unwrap();
        assert_eq!(data["svc"], json!({"host": "a", "port": 443, "tls": true}));
    }

    #[test]
    fn named_sequence_elements_merge() {
        let old = json!([
            {"name": "db", "port": 5432},
            {"name": "cache", "port": 6379}
        ]);
        let new = json!([
            {"name": "db", "replicas": 3},
            {"name": "queue", "port": 5672}
        ]);

        let merged = merge_values(old, new);
        assert_eq!(
            merged,
            json!([
                {"name": "db", "port": 5432, "replicas": 3},
                {"name": "cache", "port": 6379},
                {"name": "queue", "port": 5672}
            ])
        );
    }

    #[test]
    fn unnamed_sequences_append() {
        let merged = merge_values(json!([1, 2]), json!([2, 3]));
        assert_eq!(merged, json!([1, 2, 2, 3]));
    }

    #[test]
    fn mismatched_shapes_replace() {
        assert_eq!(merge_values(json!({"a": 1}), json!("flat")), json!("flat"));
        assert_eq!(merge_values(json!([1]), json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn resolution_is_deterministic() {
        let ct = cluster_type("drone", &[]);
        let dt = target("app1-test", "app1", &[]);
        let maps = vec![
            config_map("z", &[], &[("k3", "v3")]),
            config_map("a", &[], &[("k1", "v1"), ("k2", "v2")]),
        ];

        let first = resolve(&maps, &ct, &dt).unwrap();
        let second = resolve(&maps, &ct, &dt).unwrap();
        assert_eq!(first, second);
        // BTreeMap iteration is key-sorted
        let keys: Vec<&String> = first.keys().collect();
        assert_eq!(keys, vec!["k1", "k2", "k3"]);
    }

    #[test]
    fn empty_set_resolves_to_empty_data() {
        let ct = cluster_type("drone", &[]);
        let dt = target("app1-test", "app1", &[]);
        let data = resolve(&[], &ct, &dt).unwrap();
        assert!(data.is_empty());
    }
}
