use crate::error::AdmissionError;

use rollgate_crd::{
    Application, CapacityTarget, Cluster, InstallationTarget, Release, RolloutBlock, TrafficTarget,
};
use rollgate_rollout_block::{Operation, Validator};
use rollgate_telemetry::metrics::MetricsSink;

use kube::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    pub kind: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Status {
    pub code: u16,
    pub message: String,
}

impl AdmissionResponse {
    pub fn allow(uid: String) -> Self {
        Self {
            uid,
            allowed: true,
            status: None,
        }
    }

    pub fn deny(uid: String, code: u16, message: impl Into<String>) -> Self {
        Self {
            uid,
            allowed: false,
            status: Some(Status {
                code,
                message: message.into(),
            }),
        }
    }
}

impl AdmissionReview {
    fn respond(api_version: &str, response: AdmissionResponse) -> Self {
        let api_version = match api_version {
            "" => ADMISSION_API_VERSION,
            version => version,
        };
        Self {
            api_version: api_version.to_string(),
            kind: ADMISSION_REVIEW_KIND.to_string(),
            request: None,
            response: Some(response),
        }
    }
}

/// Kinds this webhook knows about. Only applications and releases are checked against rollout
/// blocks; the others are only required to be well formed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Application,
    Release,
    Cluster,
    InstallationTarget,
    CapacityTarget,
    TrafficTarget,
    RolloutBlock,
    Other,
}

impl From<&str> for ResourceKind {
    fn from(kind: &str) -> Self {
        match kind {
            "Application" => ResourceKind::Application,
            "Release" => ResourceKind::Release,
            "Cluster" => ResourceKind::Cluster,
            "InstallationTarget" => ResourceKind::InstallationTarget,
            "CapacityTarget" => ResourceKind::CapacityTarget,
            "TrafficTarget" => ResourceKind::TrafficTarget,
            "RolloutBlock" => ResourceKind::RolloutBlock,
            _ => ResourceKind::Other,
        }
    }
}

impl ResourceKind {
    /// Metric label. Kinds outside the closed set collapse into `other`.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Application => "Application",
            ResourceKind::Release => "Release",
            ResourceKind::Cluster => "Cluster",
            ResourceKind::InstallationTarget => "InstallationTarget",
            ResourceKind::CapacityTarget => "CapacityTarget",
            ResourceKind::TrafficTarget => "TrafficTarget",
            ResourceKind::RolloutBlock => "RolloutBlock",
            ResourceKind::Other => "other",
        }
    }
}

fn operation_label(operation: &Operation) -> &str {
    match operation {
        Operation::Create | Operation::Update => operation.as_str(),
        Operation::Other(_) => "other",
    }
}

#[derive(Deserialize)]
struct UidProbe {
    request: Option<UidOnly>,
}

#[derive(Deserialize)]
struct UidOnly {
    #[serde(default)]
    uid: String,
}

/// Best effort uid of a review that failed to decode, so the API server can still correlate the
/// denial.
fn salvage_uid(body: &[u8]) -> String {
    serde_json::from_slice::<UidProbe>(body)
        .ok()
        .and_then(|probe| probe.request)
        .map(|request| request.uid)
        .unwrap_or_default()
}

fn decode<K: DeserializeOwned>(
    kind: &str,
    field: &'static str,
    value: Value,
) -> Result<K, AdmissionError> {
    serde_json::from_value(value).map_err(|source| AdmissionError::Decode {
        kind: kind.to_string(),
        field,
        source,
    })
}

/// Decodes a namespaced document, taking the namespace from the request when the document omits
/// it, as the API server does on create.
fn decode_namespaced<K: DeserializeOwned + Resource>(
    kind: &str,
    field: &'static str,
    value: Value,
    namespace: Option<&str>,
) -> Result<K, AdmissionError> {
    let mut obj: K = decode(kind, field, value)?;
    if obj.meta().namespace.is_none() {
        obj.meta_mut().namespace = namespace.map(str::to_string);
    }
    Ok(obj)
}

fn admit(validator: &Validator, request: AdmissionRequest) -> Result<(), AdmissionError> {
    let kind_name = request.kind.kind.as_str();
    let kind = ResourceKind::from(kind_name);
    let operation = Operation::from(request.operation.as_str());
    if kind == ResourceKind::Other {
        return Ok(());
    }

    let Some(object) = request.object else {
        return match operation {
            Operation::Other(_) => Ok(()),
            Operation::Create | Operation::Update => Err(AdmissionError::MissingObject),
        };
    };
    let namespace = request.namespace.as_deref();

    match kind {
        ResourceKind::Application => {
            let app: Application = decode_namespaced(kind_name, "object", object, namespace)?;
            let old: Option<Application> = request
                .old_object
                .map(|old| decode_namespaced(kind_name, "oldObject", old, namespace))
                .transpose()?;
            validator.validate_application(&operation, &app, old.as_ref())?;
        }
        ResourceKind::Release => {
            let release: Release = decode_namespaced(kind_name, "object", object, namespace)?;
            let old: Option<Release> = request
                .old_object
                .map(|old| decode_namespaced(kind_name, "oldObject", old, namespace))
                .transpose()?;
            validator.validate_release(&operation, &release, old.as_ref())?;
        }
        ResourceKind::Cluster => {
            decode::<Cluster>(kind_name, "object", object)?;
        }
        ResourceKind::InstallationTarget => {
            decode::<InstallationTarget>(kind_name, "object", object)?;
        }
        ResourceKind::CapacityTarget => {
            decode::<CapacityTarget>(kind_name, "object", object)?;
        }
        ResourceKind::TrafficTarget => {
            decode::<TrafficTarget>(kind_name, "object", object)?;
        }
        ResourceKind::RolloutBlock => {
            decode::<RolloutBlock>(kind_name, "object", object)?;
        }
        ResourceKind::Other => {}
    }
    Ok(())
}

/// Answers one admission review. Malformed reviews are denied in a well-formed response rather
/// than rejected at the HTTP level.
pub fn review(validator: &Validator, metrics: &dyn MetricsSink, body: &[u8]) -> AdmissionReview {
    let incoming: AdmissionReview = match serde_json::from_slice(body) {
        Ok(review) => review,
        Err(error) => {
            let uid = salvage_uid(body);
            info!(msg = "denied malformed admission review", %uid, %error);
            metrics.observe_admission("unknown", "unknown", false);
            return AdmissionReview::respond(
                ADMISSION_API_VERSION,
                AdmissionResponse::deny(
                    uid,
                    400,
                    format!("failed to decode admission review: {error}"),
                ),
            );
        }
    };

    let Some(request) = incoming.request else {
        info!(msg = "denied admission review without request");
        metrics.observe_admission("unknown", "unknown", false);
        return AdmissionReview::respond(
            &incoming.api_version,
            AdmissionResponse::deny(String::new(), 400, "admission review has no request"),
        );
    };

    let uid = request.uid.clone();
    let kind = request.kind.kind.clone();
    let operation = request.operation.clone();
    let namespace = request.namespace.clone().unwrap_or_default();
    let name = request.name.clone().unwrap_or_default();

    let response = match admit(validator, request) {
        Ok(()) => {
            debug!(msg = "allowed admission request", %uid, %kind, %operation, %namespace, %name);
            AdmissionResponse::allow(uid)
        }
        Err(error) => {
            info!(
                msg = "denied admission request",
                %uid,
                %kind,
                %operation,
                %namespace,
                %name,
                reason = error.metric_label(),
                %error
            );
            AdmissionResponse::deny(uid, error.status_code().as_u16(), error.to_string())
        }
    };
    metrics.observe_admission(
        ResourceKind::from(kind.as_str()).label(),
        operation_label(&Operation::from(operation.as_str())),
        response.allowed,
    );

    AdmissionReview::respond(&incoming.api_version, response)
}
