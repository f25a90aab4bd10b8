use std::io;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Fatal errors of the webhook server lifecycle.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid listen address {address}: {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("invalid TLS material: {0}")]
    Tls(#[from] TlsError),

    #[error("heartbeat period must be greater than zero")]
    HeartbeatPeriod,

    #[error("rollout block cache did not sync within {0:?}")]
    CacheSyncTimeout(Duration),

    #[error("webhook server failed: {0}")]
    Serve(#[source] io::Error),
}

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("no certificate found in {}", .0.display())]
    NoCertificate(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error(transparent)]
    Rustls(#[from] rustls::Error),

    #[error("failed to parse certificate: {0}")]
    Certificate(#[from] openssl::error::ErrorStack),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reasons an admission request is denied before or by the rollout block engine.
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("failed to decode {kind} {field}: {source}")]
    Decode {
        kind: String,
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("request has no object")]
    MissingObject,

    #[error(transparent)]
    Policy(#[from] rollgate_rollout_block::Error),
}

impl AdmissionError {
    /// Code reported in the admission response status.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::Policy(_) => StatusCode::FORBIDDEN,
            AdmissionError::Decode { .. } | AdmissionError::MissingObject => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            AdmissionError::Decode { .. } => "decode",
            AdmissionError::MissingObject => "missing_object",
            AdmissionError::Policy(err) => err.metric_label(),
        }
    }
}
