//! Targets derived from a release, one per rollout concern. They are only decoded at admission
//! time; their contents are owned by the orchestrator controllers.

use crate::environment::Chart;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "shipper.booking.com",
    version = "v1alpha1",
    kind = "InstallationTarget",
    plural = "installationtargets",
    shortname = "it",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct InstallationTargetSpec {
    #[serde(default)]
    pub clusters: Vec<String>,

    #[serde(default)]
    pub can_override: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<Chart>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "shipper.booking.com",
    version = "v1alpha1",
    kind = "CapacityTarget",
    plural = "capacitytargets",
    shortname = "ct",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CapacityTargetSpec {
    #[serde(default)]
    pub clusters: Vec<ClusterCapacityTarget>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCapacityTarget {
    pub name: String,
    #[serde(default)]
    pub percent: i32,
    #[serde(default)]
    pub total_replica_count: i32,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "shipper.booking.com",
    version = "v1alpha1",
    kind = "TrafficTarget",
    plural = "traffictargets",
    shortname = "tt",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTargetSpec {
    #[serde(default)]
    pub clusters: Vec<ClusterTrafficTarget>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTrafficTarget {
    pub name: String,
    #[serde(default)]
    pub weight: u32,
}
