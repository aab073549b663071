use crate::types::WsErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to establish a worker's connection. The worker is abandoned.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid target '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect failed ({kind}): {message}")]
    Dial { kind: WsErrorKind, message: String },
}

impl ConnectError {
    pub fn kind(&self) -> WsErrorKind {
        match self {
            ConnectError::InvalidTarget { .. } => WsErrorKind::ConnectFailed,
            ConnectError::Timeout(_) => WsErrorKind::Timeout,
            ConnectError::Dial { kind, .. } => *kind,
        }
    }
}

/// Failure of a single write. Never retried.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("requester has no open connection")]
    NotConnected,

    #[error("send failed ({kind}): {message}")]
    Send { kind: WsErrorKind, message: String },
}

/// Failure while closing. The connection is still considered released.
#[derive(Debug, Error)]
pub enum CloseError {
    #[error("requester has no open connection")]
    NotConnected,

    #[error("close failed ({kind}): {message}")]
    Close { kind: WsErrorKind, message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("URL is required. Provide via argument or config file.")]
    MissingUrl,

    #[error("URL must use ws:// or wss:// scheme, got '{0}'")]
    UnsupportedScheme(String),

    #[error("Invalid header format: {0}. Expected 'Name: Value'")]
    InvalidHeader(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("ping period ({ping:?}) must be shorter than pong wait ({pong:?})")]
    PingNotUnderPong { ping: Duration, pong: Duration },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable '{0}' not set")]
    MissingEnv(String),
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind control plane on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create latency histogram: {0}")]
    Histogram(String),

    #[error("{0} task failed: {1}")]
    Task(&'static str, String),

    #[error("failed to write latency distribution to {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File '{0}' already exists. Use --force to overwrite.")]
    AlreadyExists(PathBuf),

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
