use rollgate_crd::{DEFAULT_GLOBAL_ROLLOUT_BLOCK_NAMESPACE, RolloutBlock};
use rollgate_rollout_block::{ReflectorBlockCache, Validator};
use rollgate_telemetry::metrics::{MetricsSink, WebhookMetrics};
use rollgate_telemetry::prometheus_exporter::PrometheusExporter;
use rollgate_telemetry::{LogFormat, telemetry};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, crate_authors, crate_description, crate_version};
use kube::{Api, Client};
use opentelemetry::metrics::MeterProvider;
use rustls::crypto::aws_lc_rs::default_provider;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod admission;
mod error;
mod handlers;
mod server;
mod state;
#[cfg(test)]
mod test_util;

use server::{ServerConfig, TlsPaths, WebhookServer};
use state::WebhookState;

const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(
    name = "rollgate-webhook",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n"),
)]
struct Args {
    /// Listen address (use "::" for IPv6, "0.0.0.0" for IPv4)
    #[arg(long, default_value = "0.0.0.0", env)]
    listen_address: String,

    /// Listen on given port
    #[arg(short, long, default_value_t = 8443, env)]
    port: u16,

    /// Path to TLS certificate file. Serves plain HTTP when neither certificate nor key is set.
    #[arg(long, env, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// Path to TLS private key file
    #[arg(long, env, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Seconds between two liveness heartbeats
    #[arg(long, default_value_t = 30, env, value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_period: u64,

    /// Seconds in-flight requests get to finish on shutdown
    #[arg(long, default_value_t = 30, env)]
    shutdown_timeout: u64,

    /// Seconds to wait for the rollout block cache to sync before giving up. Waits forever when
    /// unset.
    #[arg(long, env)]
    cache_sync_timeout: Option<u64>,

    /// Namespace whose rollout blocks apply to every namespace
    #[arg(long, default_value = DEFAULT_GLOBAL_ROLLOUT_BLOCK_NAMESPACE, env)]
    global_rollout_block_namespace: String,

    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`. Example: "info,kube=debug,rollgate=debug"
    #[arg(short, long, default_value = "info", env)]
    log_filter: String,

    /// Set log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env)]
    log_format: LogFormat,

    /// URL for the OpenTelemetry tracing endpoint.
    ///
    /// This optional argument specifies the URL to which traces will be sent using
    /// OpenTelemetry. If not provided, tracing will be disabled.
    #[arg(short, long, env = "OPENTELEMETRY_ENDPOINT_URL")]
    tracing_url: Option<String>,

    /// Sampling ratio for tracing.
    ///
    /// Specifies the ratio of traces to sample. A value of `1.0` will sample all traces,
    /// while a lower value will sample fewer traces. The default is `0.1`, meaning 10%
    /// of traces are sampled.
    #[arg(short, long, default_value_t = 0.1, env)]
    sample_ratio: f64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.clone(),
                key: key.clone(),
            }),
            _ => None,
        };
        ServerConfig {
            listen_address: self.listen_address.clone(),
            port: self.port,
            tls,
            heartbeat_period: Duration::from_secs(self.heartbeat_period),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout),
            cache_sync_timeout: self.cache_sync_timeout.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let args: Args = Args::parse();

    telemetry::init(
        &args.log_filter,
        args.log_format,
        args.tracing_url.as_deref(),
        args.sample_ratio,
    )
    .await?;

    let exporter = PrometheusExporter::new();
    let meter_provider = exporter.meter_provider(METRICS_EXPORT_INTERVAL);
    let metrics: Arc<dyn MetricsSink> =
        Arc::new(WebhookMetrics::new(&meter_provider.meter("rollgate")));

    let client = Client::try_default().await?;
    let (cache, cache_watcher) = ReflectorBlockCache::watch(
        Api::<RolloutBlock>::all(client),
        args.global_rollout_block_namespace.clone(),
    );
    let cache_watcher = tokio::spawn(cache_watcher);

    let state = WebhookState::new(
        Validator::new(Arc::new(cache)),
        metrics.clone(),
        exporter,
    );

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!(msg = "received shutdown signal");
        signal_shutdown.cancel();
    });

    let server = match WebhookServer::start(args.server_config(), state, metrics, &shutdown).await
    {
        Ok(Some(server)) => server,
        Ok(None) => return Ok(()),
        Err(e) => {
            error!(msg = "failed to start webhook server", %e);
            return Err(e.into());
        }
    };

    shutdown.cancelled().await;
    let result = server.stop().await;
    cache_watcher.abort();
    if let Err(e) = meter_provider.shutdown() {
        error!(msg = "failed to shut down meter provider", %e);
    }
    result?;

    info!(msg = "webhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM signal handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}
