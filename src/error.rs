// Error types shared by the config, partner and api modules. The binary
// surfaces them through `anyhow`, so every variant carries enough context
// to stand on its own in a terminal message.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read config file {}: {}", .path.display(), .source)]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {}: {}", .path.display(), .source)]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot write config file {}: {}", .path.display(), .source)]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("client {0:?} not found in config file")]
    UnknownClient(String),

    #[error("partner id {0} is not registered")]
    UnknownPartner(u32),

    #[error("oauth token refresh failed: {0}")]
    TokenRefresh(#[source] RequestError),

    #[error("file upload failed: {0}")]
    Upload(#[source] RequestError),
}

/// What went wrong during a single HTTP exchange with a partner endpoint.
/// Callers can tell a transport failure apart from a rejected request and
/// from a response body that did not contain what it should.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("cannot read local file: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(reqwest::StatusCode),

    #[error("unexpected response body: {0}")]
    Payload(String),
}
