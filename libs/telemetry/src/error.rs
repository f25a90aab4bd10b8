use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to build OpenTelemetry span exporter: {0}")]
    SpanExporter(#[from] opentelemetry_otlp::ExporterBuildError),

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("sample ratio must be between 0.0 and 1.0, got {0}")]
    SampleRatio(f64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
