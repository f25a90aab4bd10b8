use rollgate_crd::{
    Application, CapacityTarget, Cluster, InstallationTarget, Release, RolloutBlock, TrafficTarget,
};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

fn crds() -> Vec<CustomResourceDefinition> {
    vec![
        Application::crd(),
        Release::crd(),
        Cluster::crd(),
        InstallationTarget::crd(),
        CapacityTarget::crd(),
        TrafficTarget::crd(),
        RolloutBlock::crd(),
    ]
}

fn main() {
    for crd in crds() {
        // safe unwrap: we know CRD is serializable
        print!("---\n{}\n", serde_yaml::to_string(&crd).unwrap());
    }
}
