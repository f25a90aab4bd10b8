use crate::error::{Error, Result, TlsError};
use crate::handlers;
use crate::state::WebhookState;

use rollgate_telemetry::metrics::MetricsSink;

use std::fs::File;
use std::io::{self, BufReader};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use openssl::asn1::Asn1Time;
use openssl::x509::X509;
use rustls::crypto::aws_lc_rs::default_provider;
use rustls::pki_types::CertificateDer;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

const CACHE_SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// An update review carries two objects of up to 1.5 MiB each plus the envelope.
const MAX_REVIEW_BYTES: usize = 8 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_address: String,
    pub port: u16,
    /// Plain HTTP when unset.
    pub tls: Option<TlsPaths>,
    pub heartbeat_period: Duration,
    pub shutdown_timeout: Duration,
    /// Waits forever when unset.
    pub cache_sync_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_address
            .parse()
            .map_err(|source| Error::Address {
                address: self.listen_address.clone(),
                source,
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Textual `host:port`, IPv6 hosts bracketed. Used as the metrics `address` label.
    pub fn address(&self) -> String {
        match self.listen_address.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.port).to_string(),
            Err(_) => format!("{}:{}", self.listen_address, self.port),
        }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route(
            "/validate",
            post(handlers::validate).layer(DefaultBodyLimit::max(MAX_REVIEW_BYTES)),
        )
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn read_error(path: &Path) -> impl FnOnce(io::Error) -> TlsError + '_ {
    move |source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    }
}

fn load_tls_config(tls: &TlsPaths) -> Result<rustls::ServerConfig, TlsError> {
    let cert_file = File::open(&tls.cert).map_err(read_error(&tls.cert))?;
    let key_file = File::open(&tls.key).map_err(read_error(&tls.key))?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);

    let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_error(&tls.cert))?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(tls.cert.clone()));
    }

    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(read_error(&tls.key))?
        .ok_or_else(|| TlsError::NoPrivateKey(tls.key.clone()))?;

    let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

/// `notAfter` of the first certificate in a PEM file.
fn certificate_expiry(cert_path: &Path) -> Result<SystemTime, TlsError> {
    let pem = std::fs::read(cert_path).map_err(read_error(cert_path))?;
    let cert = X509::from_pem(&pem)?;
    let not_after = cert.not_after();
    debug!(msg = format!("certificate not after: {not_after}"));

    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(not_after)?;
    let seconds = diff.days as i64 * 86400 + diff.secs as i64;
    Ok(if seconds >= 0 {
        UNIX_EPOCH + Duration::from_secs(seconds as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(seconds.unsigned_abs())
    })
}

/// Polls the rollout block cache until it synced. Returns `false` when shutdown was requested
/// first.
async fn wait_for_cache_sync(
    state: &WebhookState,
    timeout: Option<Duration>,
    shutdown: &CancellationToken,
) -> Result<bool> {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(CACHE_SYNC_POLL_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(false),
            _ = ticker.tick() => {
                if state.validator.is_ready() {
                    return Ok(true);
                }
                if let Some(timeout) = timeout {
                    if started.elapsed() >= timeout {
                        return Err(Error::CacheSyncTimeout(timeout));
                    }
                }
                debug!(msg = "waiting for rollout block cache to sync");
            }
        }
    }
}

async fn heartbeat(
    metrics: Arc<dyn MetricsSink>,
    address: String,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => metrics.observe_heartbeat(&address, SystemTime::now()),
        }
    }
    debug!(msg = "heartbeat stopped", %address);
}

pub struct WebhookServer;

impl WebhookServer {
    /// Loads TLS material, waits for the rollout block cache, then binds and serves. Returns
    /// `None` when `shutdown` fires before the cache synced.
    pub async fn start(
        config: ServerConfig,
        state: WebhookState,
        metrics: Arc<dyn MetricsSink>,
        shutdown: &CancellationToken,
    ) -> Result<Option<RunningServer>> {
        let socket_addr = config.socket_addr()?;
        let address = config.address();
        if config.heartbeat_period.is_zero() {
            return Err(Error::HeartbeatPeriod);
        }
        let tls = match &config.tls {
            Some(tls) => Some((tls, load_tls_config(tls)?)),
            None => None,
        };

        if !wait_for_cache_sync(&state, config.cache_sync_timeout, shutdown).await? {
            info!(msg = "shutdown requested before rollout block cache synced");
            return Ok(None);
        }

        let handle: Handle<SocketAddr> = Handle::new();
        let app = router(state.clone());
        let server = match tls {
            Some((tls, tls_config)) => {
                let rustls_config = RustlsConfig::from_config(Arc::new(tls_config));
                match certificate_expiry(&tls.cert) {
                    Ok(expiry) => metrics.observe_certificate_expiry(&address, expiry),
                    Err(e) => warn!(msg = "failed to read certificate expiry", %e),
                }
                info!(msg = "starting HTTPS server", %socket_addr);
                tokio::spawn(
                    axum_server::bind_rustls(socket_addr, rustls_config)
                        .handle(handle.clone())
                        .serve(app.into_make_service()),
                )
            }
            None => {
                info!(msg = "starting HTTP server", %socket_addr);
                tokio::spawn(
                    axum_server::bind(socket_addr)
                        .handle(handle.clone())
                        .serve(app.into_make_service()),
                )
            }
        };

        let Some(local_addr) = handle.listening().await else {
            let source = match server.await {
                Ok(Err(e)) => e,
                Ok(Ok(())) => io::Error::other("server exited before listening"),
                Err(e) => io::Error::other(e),
            };
            return Err(Error::Bind { address, source });
        };
        info!(msg = "webhook server listening", %local_addr);

        let observers = CancellationToken::new();
        let heartbeat = tokio::spawn(heartbeat(
            metrics,
            address,
            config.heartbeat_period,
            observers.clone(),
        ));

        Ok(Some(RunningServer {
            local_addr,
            state,
            handle,
            shutdown_timeout: config.shutdown_timeout,
            observers,
            heartbeat,
            server,
        }))
    }
}

pub struct RunningServer {
    local_addr: SocketAddr,
    state: WebhookState,
    handle: Handle<SocketAddr>,
    shutdown_timeout: Duration,
    observers: CancellationToken,
    heartbeat: JoinHandle<()>,
    server: JoinHandle<io::Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and lets in-flight requests finish within the shutdown
    /// timeout. Background observers are stopped before returning.
    pub async fn stop(self) -> Result<()> {
        info!(msg = "starting graceful shutdown", timeout = ?self.shutdown_timeout);
        self.state.start_draining();
        self.handle.graceful_shutdown(Some(self.shutdown_timeout));

        self.observers.cancel();
        if let Err(e) = self.heartbeat.await {
            error!(msg = "heartbeat task failed", %e);
        }

        match self.server.await {
            Ok(result) => result.map_err(Error::Serve),
            Err(e) => Err(Error::Serve(io::Error::other(e))),
        }
    }
}
