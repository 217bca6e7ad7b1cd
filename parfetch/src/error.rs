//! Error types for the download engine.
//!
//! Failures detected while setting a download up are [`ConfigError`]s and
//! are returned before any network traffic happens. Everything that goes
//! wrong once an attempt is running is a [`DownloadError`], and an attempt
//! produces at most one of them.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while building a request or a downloader.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No output path was given.
    #[error("download file save path is empty")]
    NoSavePath,

    /// The target URL could not be parsed.
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A header name or value is not valid HTTP.
    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The outcome of a failed download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request could not be sent or no response came back.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Reading the response body failed part way through.
    #[error("failed reading response body at offset {offset}: {source}")]
    BodyRead {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// The server answered with a status the engine does not accept.
    /// `body` carries whatever the server sent back as explanation.
    #[error("server returned {status}: {body}")]
    BadStatus { status: StatusCode, body: String },

    /// A ranged request was answered with bytes from somewhere else,
    /// typically the whole resource from offset zero.
    #[error("server did not honor the range starting at byte {requested}")]
    RangeNotHonored { requested: u64 },

    /// The output file accepted fewer bytes than were handed to it.
    #[error("short write at offset {offset}: wrote {written} of {expected} bytes")]
    ShortWrite {
        offset: u64,
        expected: usize,
        written: usize,
    },

    /// The stream ended before the expected number of bytes arrived.
    #[error("stream ended early: expected {expected} bytes, received {received}")]
    Incomplete { expected: u64, received: u64 },

    /// Creating, opening or writing the output file failed.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The attempt ran past its overall deadline.
    #[error("download did not finish within {timeout:?}")]
    DeadlineExceeded { timeout: Duration },

    /// The attempt was cancelled through its [`CancelToken`](crate::CancelToken).
    #[error("download cancelled")]
    Cancelled,

    /// A worker thread panicked.
    #[error("download worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Either kind of failure, for callers that set up and run in one step.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl DownloadError {
    pub(crate) fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error is a timeout of some kind, whether raised by the
    /// deadline or by the HTTP client.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::DeadlineExceeded { .. } => true,
            Self::Transport { source, .. } => source.is_timeout(),
            Self::BodyRead { source, .. } => {
                source.kind() == io::ErrorKind::TimedOut
                    || source
                        .get_ref()
                        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                        .is_some_and(reqwest::Error::is_timeout)
            }
            _ => false,
        }
    }
}

/// Reads whatever body a rejected response carries so it can be reported.
pub(crate) fn bad_status(response: reqwest::blocking::Response) -> DownloadError {
    let status = response.status();
    match response.text() {
        Ok(body) => DownloadError::BadStatus {
            status,
            body: body.trim().to_string(),
        },
        Err(err) => DownloadError::BadStatus {
            status,
            body: format!("<unreadable body: {err}>"),
        },
    }
}
