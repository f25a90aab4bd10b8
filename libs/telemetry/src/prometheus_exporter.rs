use std::fmt::Write as FmtWrite;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry_sdk::error::OTelSdkError;
use opentelemetry_sdk::metrics::data::{
    AggregatedMetrics, Gauge, MetricData, ResourceMetrics, Sum,
};
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider, Temporality};
use tracing::debug;

/// Keeps the last collection rendered in Prometheus text format, ready to be served.
#[derive(Clone, Debug, Default)]
pub struct PrometheusExporter {
    data: Arc<Mutex<Option<String>>>,
}

impl PrometheusExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a meter provider whose readings end up in this exporter every `interval`.
    pub fn meter_provider(&self, interval: Duration) -> SdkMeterProvider {
        debug!(msg = "building meter provider", ?interval);
        let reader = PeriodicReader::builder(self.clone())
            .with_interval(interval)
            .build();
        SdkMeterProvider::builder().with_reader(reader).build()
    }

    /// Latest metrics in Prometheus text format. `None` until the first collection.
    pub fn get_metrics(&self) -> Option<String> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn format_metrics(metrics: &ResourceMetrics) -> String {
        let mut output = String::new();

        for scope_metrics in metrics.scope_metrics() {
            for metric in scope_metrics.metrics() {
                let name = metric.name();
                writeln!(output, "# HELP {} {}", name, metric.description()).ok();
                match metric.data() {
                    AggregatedMetrics::F64(data) => {
                        Self::format_metric_data(name, data, &mut output, |v| v);
                    }
                    AggregatedMetrics::U64(data) => {
                        Self::format_metric_data(name, data, &mut output, |v| v as f64);
                    }
                    AggregatedMetrics::I64(data) => {
                        Self::format_metric_data(name, data, &mut output, |v| v as f64);
                    }
                }
            }
        }

        writeln!(output, "# EOF").ok();
        output
    }

    fn format_metric_data<T: Copy>(
        name: &str,
        data: &MetricData<T>,
        output: &mut String,
        to_f64: impl Fn(T) -> f64,
    ) {
        match data {
            MetricData::Sum(sum) => Self::format_sum(name, sum, output, to_f64),
            MetricData::Gauge(gauge) => Self::format_gauge(name, gauge, output, to_f64),
            // nothing records histograms
            MetricData::Histogram(_) | MetricData::ExponentialHistogram(_) => {}
        }
    }

    fn format_sum<T: Copy>(
        name: &str,
        sum: &Sum<T>,
        output: &mut String,
        to_f64: impl Fn(T) -> f64,
    ) {
        let metric_type = if sum.is_monotonic() { "counter" } else { "gauge" };
        writeln!(output, "# TYPE {name} {metric_type}").ok();
        for data_point in sum.data_points() {
            let labels = format_attributes(data_point.attributes());
            writeln!(output, "{name}{labels} {}", to_f64(data_point.value())).ok();
        }
    }

    fn format_gauge<T: Copy>(
        name: &str,
        gauge: &Gauge<T>,
        output: &mut String,
        to_f64: impl Fn(T) -> f64,
    ) {
        writeln!(output, "# TYPE {name} gauge").ok();
        for data_point in gauge.data_points() {
            let labels = format_attributes(data_point.attributes());
            writeln!(output, "{name}{labels} {}", to_f64(data_point.value())).ok();
        }
    }
}

/// Renders attributes as Prometheus labels, escaping label values.
fn format_attributes<'a>(attrs: impl Iterator<Item = &'a KeyValue>) -> String {
    let labels: Vec<String> = attrs
        .map(|kv| {
            let value = kv
                .value
                .to_string()
                .replace('\\', r"\\")
                .replace('"', r#"\""#)
                .replace('\n', r"\n");
            format!("{}=\"{}\"", kv.key.as_str(), value)
        })
        .collect();
    if labels.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", labels.join(","))
    }
}

impl PushMetricExporter for PrometheusExporter {
    async fn export(&self, metrics: &ResourceMetrics) -> Result<(), OTelSdkError> {
        let formatted = Self::format_metrics(metrics);
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(formatted);
        Ok(())
    }

    fn force_flush(&self) -> Result<(), OTelSdkError> {
        Ok(())
    }

    fn shutdown(&self) -> Result<(), OTelSdkError> {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> Result<(), OTelSdkError> {
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        Temporality::Cumulative
    }
}
