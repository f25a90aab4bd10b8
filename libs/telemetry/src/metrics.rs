use std::time::{SystemTime, UNIX_EPOCH};

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Meter};

/// Where the webhook reports what it observes about itself.
pub trait MetricsSink: Send + Sync {
    /// The server at `address` is alive at `timestamp`.
    fn observe_heartbeat(&self, address: &str, timestamp: SystemTime);

    /// The certificate served at `address` stops being valid at `expiry`.
    fn observe_certificate_expiry(&self, address: &str, expiry: SystemTime);

    /// One admission decision.
    fn observe_admission(&self, kind: &str, operation: &str, allowed: bool);
}

/// Seconds since the epoch, negative for earlier times.
fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs() as i64,
        Err(err) => -(err.duration().as_secs() as i64),
    }
}

#[derive(Clone)]
pub struct WebhookMetrics {
    heartbeat: Gauge<i64>,
    certificate_expiry: Gauge<i64>,
    admission_requests: Counter<u64>,
}

impl WebhookMetrics {
    pub fn new(meter: &Meter) -> Self {
        let heartbeat = meter
            .i64_gauge("webhook_heartbeat_timestamp_seconds")
            .with_description("Unix time of the last webhook heartbeat")
            .build();

        let certificate_expiry = meter
            .i64_gauge("webhook_certificate_expiry_timestamp_seconds")
            .with_description("Unix time at which the served TLS certificate expires")
            .build();

        let admission_requests = meter
            .u64_counter("rollgate_admission_requests_total")
            .with_description("Admission requests answered, by kind, operation and decision")
            .build();

        Self {
            heartbeat,
            certificate_expiry,
            admission_requests,
        }
    }
}

impl MetricsSink for WebhookMetrics {
    fn observe_heartbeat(&self, address: &str, timestamp: SystemTime) {
        self.heartbeat.record(
            unix_seconds(timestamp),
            &[KeyValue::new("address", address.to_string())],
        );
    }

    fn observe_certificate_expiry(&self, address: &str, expiry: SystemTime) {
        self.certificate_expiry.record(
            unix_seconds(expiry),
            &[KeyValue::new("address", address.to_string())],
        );
    }

    fn observe_admission(&self, kind: &str, operation: &str, allowed: bool) {
        self.admission_requests.add(
            1,
            &[
                KeyValue::new("kind", kind.to_string()),
                KeyValue::new("operation", operation.to_string()),
                KeyValue::new("allowed", allowed),
            ],
        );
    }
}
