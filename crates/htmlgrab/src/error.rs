//! Error types for htmlgrab

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while validating an address or fetching it
#[derive(Debug, Error)]
pub enum FetchError {
    /// Address is missing
    #[error("Missing required parameter: url")]
    MissingUrl,

    /// Address has a scheme other than http or https
    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrlScheme,

    /// Address could not be parsed as a URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// The whole request did not finish within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Name resolution, TCP connect or TLS handshake failed
    #[error("Failed to connect to server")]
    ConnectError(#[source] reqwest::Error),

    /// Server answered with a 4xx or 5xx status
    #[error("HTTP error {status_code}: {reason}")]
    Http {
        /// Status code as received
        status_code: u16,
        /// Reason phrase for the status code
        reason: String,
    },

    /// Other request error
    #[error("Request failed: {0}")]
    RequestError(String),
}

impl FetchError {
    /// Classify a reqwest error
    ///
    /// Timeouts are checked first: reqwest reports a connect timeout as
    /// both a timeout and a connect error.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if err.is_connect() {
            FetchError::ConnectError(err)
        } else {
            FetchError::RequestError(err.to_string())
        }
    }
}

/// Errors raised by output sinks
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing the output file failed
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        /// Target path of the write
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error reported at the pipeline boundary
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Save(#[from] SinkError),

    /// Internal fault, e.g. a panic inside the worker task
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Coarse classification of an [`Error`] for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Connection,
    Http,
    Request,
    Io,
    Unexpected,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connection => "connection error",
            ErrorKind::Http => "HTTP error",
            ErrorKind::Request => "request error",
            ErrorKind::Io => "I/O error",
            ErrorKind::Unexpected => "unexpected error",
        };
        f.write_str(name)
    }
}

impl FetchError {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Timeout(_) => ErrorKind::Timeout,
            FetchError::ConnectError(_) => ErrorKind::Connection,
            FetchError::Http { .. } => ErrorKind::Http,
            FetchError::ClientBuildError(_) => ErrorKind::Unexpected,
            FetchError::MissingUrl
            | FetchError::InvalidUrlScheme
            | FetchError::InvalidUrl(_)
            | FetchError::RequestError(_) => ErrorKind::Request,
        }
    }
}

impl Error {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Fetch(err) => err.kind(),
            Error::Save(_) => ErrorKind::Io,
            Error::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}
