use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Rejected generator or channel update.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("invalid channel {0}, expected 0-3")]
    InvalidChannel(i64),
    #[error("frequency must be greater than zero, got {0}")]
    NonPositiveFrequency(f64),
    #[error("sampling rate must be greater than zero, got {0}")]
    NonPositiveSamplingRate(f64),
    #[error("sampling rate {0} gives an unusable tick period")]
    SamplingRateOutOfRange(f64),
    #[error("noise must not be negative, got {0}")]
    NegativeNoise(f64),
    #[error("{0} must be a finite number")]
    NonFinite(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failure decoding a message received over the socket.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported binary frame of {0} bytes")]
    Binary(usize),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "parquet")]
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[cfg(feature = "parquet")]
    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid listen address {0:?}")]
    Address(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Params(#[from] ParamError),
}

/// A single client session ended abnormally; the caller reconnects.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to encode control message: {0}")]
    Encode(#[from] serde_json::Error),
}
