//! Error types for the activity pipeline
//!
//! Every failure here is recoverable: the store rejects bad drafts, the poller
//! keeps stale data, and the scene falls back to a flat globe.

use std::path::PathBuf;
use thiserror::Error;

/// Coordinate outside the WGS84 ranges (or not a number at all)
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    #[error("invalid coordinate: lat {lat}, lng {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

/// Rejected event draft at the store / HTTP boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error(transparent)]
    InvalidCoordinate(#[from] GeoError),
    #[error("event has no geo location and none could be resolved")]
    MissingGeo,
    #[error("malformed event: {0}")]
    Malformed(String),
}

/// Failure to fetch the activity log from the server
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("server answered HTTP {0}")]
    Status(u16),
    #[error("unexpected response: {0}")]
    Malformed(String),
    #[error("server reported failure: {0}")]
    Rejected(String),
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => TransportError::Status(code),
            ureq::Error::Transport(t) if is_timeout(&t) => TransportError::Timeout,
            ureq::Error::Transport(t) => TransportError::Network(t.to_string()),
        }
    }
}

/// Walks the source chain for an I/O timeout. Connect timeouts arrive as
/// `ConnectionFailed`, read timeouts as `Io`, and unix sockets may report them
/// as `WouldBlock`.
fn is_timeout(transport: &ureq::Transport) -> bool {
    if !matches!(transport.kind(), ureq::ErrorKind::Io | ureq::ErrorKind::ConnectionFailed) {
        return false;
    }
    let mut source = std::error::Error::source(transport);
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            if matches!(io_err.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

/// Base sphere texture could not be used
#[derive(Debug, Error)]
pub enum TextureLoadError {
    #[error("cannot read texture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture {0} has no pixels")]
    Empty(PathBuf),
}
