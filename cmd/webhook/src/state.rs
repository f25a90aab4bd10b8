use rollgate_rollout_block::Validator;
use rollgate_telemetry::metrics::MetricsSink;
use rollgate_telemetry::prometheus_exporter::PrometheusExporter;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone)]
pub struct WebhookState {
    pub validator: Validator,
    pub metrics: Arc<dyn MetricsSink>,
    pub exporter: PrometheusExporter,
    draining: Arc<AtomicBool>,
}

impl WebhookState {
    pub fn new(
        validator: Validator,
        metrics: Arc<dyn MetricsSink>,
        exporter: PrometheusExporter,
    ) -> Self {
        Self {
            validator,
            metrics,
            exporter,
            draining: Arc::default(),
        }
    }

    /// Ready while the rollout block cache is synced and the server is not shutting down.
    pub fn is_ready(&self) -> bool {
        !self.draining.load(Ordering::Acquire) && self.validator.is_ready()
    }

    pub fn start_draining(&self) {
        self.draining.store(true, Ordering::Release);
    }
}
