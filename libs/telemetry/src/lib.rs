pub mod error;
pub mod metrics;
pub mod prometheus_exporter;
pub mod telemetry;

pub use error::{Error, Result};
pub use telemetry::{LogFormat, init};
