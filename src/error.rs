use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: expected KEY=VALUE", path.display())]
    Parse { path: PathBuf, line: usize },

    #[error("invalid LocalAPI endpoint '{0}'")]
    Endpoint(String),

    #[error("no LocalAPI endpoint configured; pass --socket or set TS_SOCKET")]
    MissingEndpoint,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to LocalAPI at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to build LocalAPI request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("LocalAPI request failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("LocalAPI {path} did not answer within {after:?}")]
    Timeout { path: String, after: Duration },

    #[error("LocalAPI {path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("malformed LocalAPI payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything that ends a run with a non-zero exit status.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start node: {0}")]
    Start(#[source] ClientError),

    #[error("Failed to get status: {0}")]
    Status(#[source] ClientError),

    #[error("Interrupted while waiting for backend to start")]
    Cancelled,

    #[error("Backend did not reach Running within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Failed to write peers: {0}")]
    Output(#[from] io::Error),
}
