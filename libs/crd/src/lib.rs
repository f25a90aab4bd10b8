pub mod application;
pub mod cluster;
pub mod environment;
pub mod release;
pub mod rollout_block;
pub mod target;

pub use application::{Application, ApplicationSpec};
pub use cluster::{Cluster, ClusterSpec};
pub use environment::ReleaseEnvironment;
pub use release::{Release, ReleaseSpec};
pub use rollout_block::{RolloutBlock, RolloutBlockSpec};
pub use target::{CapacityTarget, InstallationTarget, TrafficTarget};

/// Annotation listing the rollout blocks a resource claims to be exempt from.
pub const ROLLOUT_BLOCK_OVERRIDE_ANNOTATION: &str = "shipper.booking.com/rollout-block.override";

/// Namespace holding the rollout blocks that apply to every namespace, unless configured otherwise.
pub const DEFAULT_GLOBAL_ROLLOUT_BLOCK_NAMESPACE: &str = "rollout-blocks-global";
