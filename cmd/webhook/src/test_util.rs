use rollgate_rollout_block::{ActiveBlock, StaticBlockCache, Validator};
use rollgate_telemetry::metrics::MetricsSink;
use rollgate_telemetry::prometheus_exporter::PrometheusExporter;

use crate::state::WebhookState;

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Sink keeping everything it observes.
#[derive(Default)]
pub struct RecordingSink {
    heartbeats: Mutex<Vec<(String, SystemTime)>>,
    certificate_expiries: Mutex<Vec<(String, SystemTime)>>,
    admissions: Mutex<Vec<(String, String, bool)>>,
}

impl RecordingSink {
    pub fn heartbeats(&self) -> Vec<(String, SystemTime)> {
        self.heartbeats.lock().unwrap().clone()
    }

    pub fn certificate_expiries(&self) -> Vec<(String, SystemTime)> {
        self.certificate_expiries.lock().unwrap().clone()
    }

    pub fn admissions(&self) -> Vec<(String, String, bool)> {
        self.admissions.lock().unwrap().clone()
    }
}

impl MetricsSink for RecordingSink {
    fn observe_heartbeat(&self, address: &str, timestamp: SystemTime) {
        self.heartbeats
            .lock()
            .unwrap()
            .push((address.to_string(), timestamp));
    }

    fn observe_certificate_expiry(&self, address: &str, expiry: SystemTime) {
        self.certificate_expiries
            .lock()
            .unwrap()
            .push((address.to_string(), expiry));
    }

    fn observe_admission(&self, kind: &str, operation: &str, allowed: bool) {
        self.admissions
            .lock()
            .unwrap()
            .push((kind.to_string(), operation.to_string(), allowed));
    }
}

pub fn state_with_cache(cache: StaticBlockCache, sink: Arc<RecordingSink>) -> WebhookState {
    WebhookState::new(
        Validator::new(Arc::new(cache)),
        sink,
        PrometheusExporter::new(),
    )
}

pub fn state(blocks: Vec<ActiveBlock>, sink: Arc<RecordingSink>) -> WebhookState {
    state_with_cache(StaticBlockCache::new("rollout-blocks-global", blocks), sink)
}
