use crate::environment::ReleaseEnvironment;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An application is the user-facing description of something to deploy. Every change to its
/// template produces a new release.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "shipper.booking.com",
    version = "v1alpha1",
    kind = "Application",
    plural = "applications",
    shortname = "app",
    namespaced,
    status = "ApplicationStatus",
    printcolumn = r#"{"name":"Chart","type":"string","jsonPath":".spec.template.chart.version"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Number of historical releases to keep around.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_history_limit: Option<i32>,

    #[serde(default)]
    pub template: ReleaseEnvironment,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Value>>,
}
