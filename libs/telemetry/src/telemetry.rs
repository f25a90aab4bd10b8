use crate::error::{Error, Result};

use clap::ValueEnum;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const SERVICE_NAME: &str = "rollgate-webhook";

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn sampler(sample_ratio: f64) -> Result<Sampler> {
    if !(0.0..=1.0).contains(&sample_ratio) {
        return Err(Error::SampleRatio(sample_ratio));
    }
    Ok(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
        sample_ratio,
    ))))
}

fn tracer_provider(tracing_url: &str, sample_ratio: f64) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(tracing_url)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(sampler(sample_ratio)?)
        .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
        .build())
}

/// Installs the global tracing subscriber. Spans are exported over OTLP when `tracing_url` is
/// set.
pub async fn init(
    log_filter: &str,
    log_format: LogFormat,
    tracing_url: Option<&str>,
    sample_ratio: f64,
) -> Result<()> {
    let filter = EnvFilter::try_new(log_filter)?;

    let fmt_layer = match log_format {
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let otel_layer = match tracing_url {
        Some(url) => {
            let provider = tracer_provider(url, sample_ratio)?;
            let tracer = provider.tracer(SERVICE_NAME);
            opentelemetry::global::set_tracer_provider(provider);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_rejects_out_of_range_ratio() {
        assert!(matches!(sampler(1.5), Err(Error::SampleRatio(_))));
        assert!(matches!(sampler(-0.1), Err(Error::SampleRatio(_))));
        assert!(sampler(0.1).is_ok());
    }

    #[test]
    fn test_log_format_from_cli_value() {
        assert_eq!(LogFormat::from_str("json", true), Ok(LogFormat::Json));
        assert_eq!(LogFormat::from_str("text", true), Ok(LogFormat::Text));
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_filter() {
        let result = init("info,rollgate=loud", LogFormat::Text, None, 0.1).await;
        assert!(matches!(result, Err(Error::LogFilter(_))));
    }
}
