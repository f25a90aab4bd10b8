use crate::environment::ReleaseEnvironment;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A release is one immutable revision of an application. Only `targetStep` is expected to move
/// once a release exists; its environment is fixed at creation.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "shipper.booking.com",
    version = "v1alpha1",
    kind = "Release",
    plural = "releases",
    shortname = "rel",
    namespaced,
    status = "ReleaseStatus",
    printcolumn = r#"{"name":"Target Step","type":"integer","jsonPath":".spec.targetStep"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    #[serde(default)]
    pub target_step: i32,

    #[serde(default)]
    pub environment: ReleaseEnvironment,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achieved_step: Option<AchievedStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Value>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AchievedStep {
    pub step: i32,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_decode_release() {
        let release: Release = serde_json::from_value(json!({
            "apiVersion": "shipper.booking.com/v1alpha1",
            "kind": "Release",
            "metadata": {"name": "nginx-abc-0", "namespace": "default"},
            "spec": {
                "targetStep": 1,
                "environment": {"chart": {"name": "nginx", "version": "0.1.0"}}
            },
            "status": {"achievedStep": {"step": 0, "name": "staging"}}
        }))
        .unwrap();
        assert_eq!(release.spec.target_step, 1);
        assert_eq!(release.spec.environment.chart.version, "0.1.0");
        assert_eq!(release.status.unwrap().achieved_step.unwrap().name, "staging");
    }
}
