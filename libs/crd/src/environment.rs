use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything a release needs to be rolled out: the chart, its values, where it runs and how it
/// progresses. Applications carry one as a template and stamp it into every release they create.
///
/// Fields this crate does not model are kept in `extra`, so two environments compare equal only
/// when every field of the original documents is equal.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEnvironment {
    #[serde(default)]
    pub chart: Chart,

    /// Free-form chart values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,

    #[serde(default)]
    pub cluster_requirements: ClusterRequirements,

    /// Rollout strategy steps. Opaque to the admission path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Value>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub repo_url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequirements {
    #[serde(default)]
    pub regions: Vec<RegionRequirement>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegionRequirement {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_unknown_fields_are_kept() {
        let env: ReleaseEnvironment = serde_json::from_value(json!({
            "chart": {"name": "nginx", "version": "0.1.0", "repoUrl": "https://charts.example.com"},
            "cluster": "eu-1",
        }))
        .unwrap();
        assert_eq!(env.chart.name, "nginx");
        assert_eq!(env.extra.get("cluster"), Some(&json!("eu-1")));
    }

    #[test]
    fn test_environments_differing_in_unknown_field_are_not_equal() {
        let a: ReleaseEnvironment = serde_json::from_value(json!({"cluster": "eu-1"})).unwrap();
        let b: ReleaseEnvironment = serde_json::from_value(json!({"cluster": "eu-2"})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let result = serde_json::from_value::<ReleaseEnvironment>(json!({
            "clusterRequirements": {"regions": "eu"}
        }));
        assert!(result.is_err());
    }
}
