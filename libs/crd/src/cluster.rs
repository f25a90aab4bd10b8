use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An application cluster that releases can be scheduled on.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "shipper.booking.com",
    version = "v1alpha1",
    kind = "Cluster",
    plural = "clusters",
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub api_master: String,

    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub scheduler: ClusterSchedulerSettings,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSchedulerSettings {
    #[serde(default)]
    pub unschedulable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}
