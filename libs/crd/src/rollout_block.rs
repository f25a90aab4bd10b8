use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// While it exists, a rollout block prevents applications and releases in its scope from being
/// created or from changing their spec, unless they explicitly override it.
///
/// Blocks in the global rollout block namespace apply cluster-wide; any other block only applies
/// to its own namespace.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "shipper.booking.com",
    version = "v1alpha1",
    kind = "RolloutBlock",
    plural = "rolloutblocks",
    shortname = "rb",
    namespaced,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".spec.message"}"#,
    printcolumn = r#"{"name":"Author","type":"string","jsonPath":".spec.author.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RolloutBlockSpec {
    /// Why rollouts are blocked. Shown to users whose changes are denied.
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub author: RolloutBlockAuthor,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolloutBlockAuthor {
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub name: String,
}
